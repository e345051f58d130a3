use crate::backend::ConnectedSite;
use crate::db::Db;
use crate::wallet_tab::{ActiveTab, TabSnapshot};
use rocket::response::Debug;
use rocket::serde::{json::Json, Deserialize, Serialize};
use rocket::State;

#[derive(Serialize, Deserialize)]
pub struct GetWalletTabRequest {}

#[post("/get_wallet_tab", data = "<_request>")]
pub async fn get_wallet_tab(
    _request: Json<GetWalletTabRequest>,
    active: &State<ActiveTab>,
) -> Result<Json<TabSnapshot>, Debug<anyhow::Error>> {
    Ok(Json(active.tab().snapshot()))
}

#[derive(Serialize, Deserialize)]
pub struct ActivateRequest {
    tab_id: Option<u32>,
}

#[derive(Serialize, Deserialize)]
pub struct ActivateResponse {
    active: bool,
}

#[post("/activate", data = "<request>")]
pub async fn activate(
    request: Json<ActivateRequest>,
    active: &State<ActiveTab>,
) -> Result<Json<ActivateResponse>, Debug<anyhow::Error>> {
    let request = request.into_inner();
    active.activate(request.tab_id)?;
    Ok(Json(ActivateResponse {
        active: active.is_active()?,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct DeactivateRequest {}

#[post("/deactivate", data = "<_request>")]
pub async fn deactivate(
    _request: Json<DeactivateRequest>,
    active: &State<ActiveTab>,
) -> Result<Json<ActivateResponse>, Debug<anyhow::Error>> {
    active.deactivate()?;
    Ok(Json(ActivateResponse {
        active: active.is_active()?,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct RefreshActivityRequest {}

#[derive(Serialize, Deserialize)]
pub struct RefreshActivityResponse {
    sequence: u64,
}

#[post("/refresh_activity", data = "<_request>")]
pub async fn refresh_activity(
    _request: Json<RefreshActivityRequest>,
    active: &State<ActiveTab>,
) -> Result<Json<RefreshActivityResponse>, Debug<anyhow::Error>> {
    let (sequence, _) = active.tab().refresh_activity();
    let rep = RefreshActivityResponse { sequence };
    Ok(Json(rep))
}

#[derive(Serialize, Deserialize)]
pub struct SetShowSafeNoticeRequest {
    show: bool,
}

#[post("/set_show_safe_notice", data = "<request>")]
pub async fn set_show_safe_notice(
    request: Json<SetShowSafeNoticeRequest>,
    active: &State<ActiveTab>,
) -> Result<Json<SetShowSafeNoticeRequest>, Debug<anyhow::Error>> {
    let request = request.into_inner();
    active.tab().set_show_safe_notice(request.show).await?;
    Ok(Json(request))
}

#[derive(Serialize, Deserialize)]
pub struct SetConnectedSiteRequest {
    tab_id: u32,
    origin: String,
    is_connected: bool,
}

#[derive(Serialize, Deserialize)]
pub struct SetConnectedSiteResponse {}

#[post("/set_connected_site", data = "<request>")]
pub async fn set_connected_site(
    request: Json<SetConnectedSiteRequest>,
    db: &State<Db>,
) -> Result<Json<SetConnectedSiteResponse>, Debug<anyhow::Error>> {
    let request = request.into_inner();
    let site = ConnectedSite {
        origin: request.origin,
        is_connected: request.is_connected,
    };
    db.store_connected_site(request.tab_id, &site)?;
    log::info!("Tab {} on {} connected: {}", request.tab_id, site.origin, site.is_connected);
    Ok(Json(SetConnectedSiteResponse {}))
}
