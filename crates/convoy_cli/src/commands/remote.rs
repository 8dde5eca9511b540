//! One-shot client commands: query, checkout, commit.

use convoy_client::{parse_listing, HttpClient, RemoteRepository, RemoteStore, ReqwestClient};
use std::fs;
use std::path::Path;
use std::sync::Arc;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

fn http_client() -> Result<Arc<dyn HttpClient>, Box<dyn std::error::Error>> {
    Ok(Arc::new(ReqwestClient::new()?))
}

fn remote(
    url: &str,
    customer: &str,
    name: &str,
) -> Result<RemoteRepository, Box<dyn std::error::Error>> {
    Ok(RemoteRepository::new(url, customer, name, http_client()?))
}

/// Lists stores and their version ranges.
pub fn query(
    url: &str,
    customer: Option<&str>,
    name: Option<&str>,
    masters_only: bool,
    format: &str,
) -> CommandResult {
    let mut query_url = format!("{}/repository/query?", url.trim_end_matches('/'));
    if let Some(customer) = customer {
        query_url.push_str(&format!("customer={}&", urlencoding::encode(customer)));
    }
    if let Some(name) = name {
        query_url.push_str(&format!("name={}&", urlencoding::encode(name)));
    }
    if masters_only {
        query_url.push_str("filter=master&");
    }
    let query_url = query_url.trim_end_matches(['&', '?']).to_string();

    let reply = http_client()?.get(&query_url)?;
    if reply.status != 200 {
        return Err(format!("query failed with status {}", reply.status).into());
    }
    let listings = parse_listing(&reply.body)?;

    if format == "json" {
        let rows: Vec<serde_json::Value> = listings
            .iter()
            .map(|l| {
                serde_json::json!({
                    "customer": l.customer,
                    "name": l.name,
                    "range": l.range.to_representation(),
                    "highest": l.range.high(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for l in &listings {
            println!("{},{},{}", l.customer, l.name, l.range.to_representation());
        }
    }
    Ok(())
}

/// Fetches one version's payload into a file.
pub fn checkout(
    url: &str,
    customer: &str,
    name: &str,
    version: Option<u64>,
    out: &Path,
) -> CommandResult {
    let remote = remote(url, customer, name)?;
    let version = match version {
        Some(v) => v,
        None => {
            let high = remote.range()?.high();
            if high == 0 {
                return Err(format!("store {customer}/{name} has no versions").into());
            }
            high
        }
    };
    let data = remote.checkout(version)?;
    fs::write(out, &data)?;
    println!(
        "checked out {customer}/{name} version {version} ({} bytes) to {}",
        data.len(),
        out.display()
    );
    Ok(())
}

/// Proposes a file as the next version.
pub fn commit(url: &str, customer: &str, name: &str, version: u64, input: &Path) -> CommandResult {
    let remote = remote(url, customer, name)?;
    let file = fs::File::open(input)?;
    if remote.commit(Box::new(file), version)? {
        println!("committed {customer}/{name} as version {}", version + 1);
    } else {
        println!(
            "commit rejected: version {version} is stale; check out the current version and retry"
        );
    }
    Ok(())
}
