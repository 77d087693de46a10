pub mod handlers;
pub mod payload;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::qr_routes()
}
