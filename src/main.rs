use posture_guard::cli::CliApp;

#[tokio::main]
async fn main() {
    let app = CliApp::new();
    let display = posture_guard::cli::display::Display::new();

    if let Err(e) = app.run().await {
        tracing::error!(error = %e, category = %e.category(), "Command failed");
        display.error(&e.to_string());
        std::process::exit(1);
    }
}
