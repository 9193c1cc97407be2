#[tokio::main]
async fn main() {
    fameish_api::start_server().await;
}
