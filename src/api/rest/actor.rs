use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::order::Order;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthenticated(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| AppError::Unauthenticated(format!("{name} is not valid text")))
}

/// Identity asserted by the authenticating proxy in front of this service.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|err| AppError::Unauthenticated(format!("invalid {ACTOR_ID_HEADER}: {err}")))?;
        let role = header(parts, ACTOR_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(AppError::Unauthenticated)?;
        let name = header(parts, ACTOR_NAME_HEADER)?.trim();
        if name.is_empty() {
            return Err(AppError::Unauthenticated(format!(
                "{ACTOR_NAME_HEADER} cannot be empty"
            )));
        }

        Ok(Actor::new(id, name, role))
    }
}

pub fn require_admin(actor: &Actor) -> Result<(), AppError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin role required".to_string()))
    }
}

/// Admins, the ordering customer and the courier on the job may read an order.
pub fn ensure_can_view(actor: &Actor, order: &Order) -> Result<(), AppError> {
    let courier_on_job = order
        .assigned_courier_id()
        .is_some_and(|courier_id| actor.is_courier(courier_id));

    if actor.is_admin() || order.is_owned_by(actor) || courier_on_job {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "order {} is not visible to this actor",
            order.order_number
        )))
    }
}
