#[tokio::main]
async fn main() {
    tst_lsp::run().await;
}
