//! Status change effector service.

use gatehouse_effectors::{router, serve};

#[tokio::main]
async fn main() {
    serve::run("gatehouse-status", "0.0.0.0:4101", router::status_router).await;
}
