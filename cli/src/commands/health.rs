use clap::Args;

use crate::util::api_request;

#[derive(Args)]
pub struct HealthArgs {
    /// Only check that the process is up, without probing vendors
    #[arg(long)]
    pub liveness: bool,
}

pub async fn run(api_url: &str, args: HealthArgs) -> i32 {
    let path = if args.liveness { "/health" } else { "/api/health" };
    api_request(api_url, reqwest::Method::GET, path, None, &[]).await
}
