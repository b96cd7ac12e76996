//! Identity change effector service.

use gatehouse_effectors::{router, serve};

#[tokio::main]
async fn main() {
    serve::run("gatehouse-identity", "0.0.0.0:4102", router::identity_router).await;
}
