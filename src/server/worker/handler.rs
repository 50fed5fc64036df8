//! Task handlers of the swipex worker.
//!
//! Binds every producer task to the service operation executing it. The pool adds the
//! [`TaskName::HealthCheck`] handler itself.

use crate::server::{
    error::Error,
    model::{
        dto::{CreateOrderRequest, OAuth2SaveUser, SignUpRequest, UserUpdate},
        task::TaskName,
    },
    service::{account::AccountService, order::OrderService},
    worker::registry::TaskRegistry,
};

/// Builds the registry of the account and order task handlers
pub fn build_registry(accounts: AccountService, orders: OrderService) -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    let service = accounts.clone();
    registry.register(TaskName::SignUp, move |req: SignUpRequest| {
        let service = service.clone();

        async move {
            let id = service.sign_up(req).await?;
            tracing::debug!("Sign up task completed (created: {:?})", id);
            Ok::<(), Error>(())
        }
    });

    let service = accounts.clone();
    registry.register(TaskName::UpdateUserInfo, move |req: UserUpdate| {
        let service = service.clone();

        async move { service.update_user_info(req).await }
    });

    let service = accounts;
    registry.register(TaskName::OAuth2SaveUser, move |req: OAuth2SaveUser| {
        let service = service.clone();

        async move { service.oauth2_save_user(req).await.map(|_| ()) }
    });

    let service = orders;
    registry.register(TaskName::CreateOrder, move |req: CreateOrderRequest| {
        let service = service.clone();

        async move { service.create_order(req).await.map(|_| ()) }
    });

    registry
}
