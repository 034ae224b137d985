use std::env;

use loadgen_server::report::ProfileReport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let path = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| loadgen_server::config::DEFAULT_PROFILE_PATH.to_string());

    let report = ProfileReport::load(&path).await?;
    println!("Profile {}", path);
    print!("{}", report);
    Ok(())
}
