//! Access change effector service.

use gatehouse_effectors::{router, serve};

#[tokio::main]
async fn main() {
    serve::run("gatehouse-access", "0.0.0.0:4103", router::access_router).await;
}
