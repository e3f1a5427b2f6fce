//! MX resolution for direct delivery and sender-domain validation

use crate::error::Result;
use tracing::{debug, warn};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Resolve the mail hosts for a domain, sorted by MX priority (lowest
/// first). A failed MX lookup falls back to the domain itself (A record
/// delivery).
pub async fn lookup_mx(domain: &str) -> Result<Vec<String>> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let mx_lookup = match resolver.mx_lookup(domain).await {
        Ok(lookup) => lookup,
        Err(e) => {
            warn!("MX lookup failed for {}: {}", domain, e);
            return Ok(vec![domain.to_string()]);
        }
    };

    let mut mx_records: Vec<(u16, String)> = mx_lookup
        .iter()
        .map(|mx| {
            let exchange = mx.exchange().to_string().trim_end_matches('.').to_string();
            (mx.preference(), exchange)
        })
        .collect();
    mx_records.sort_by_key(|(priority, _)| *priority);

    debug!("Found {} MX record(s) for {}", mx_records.len(), domain);

    let servers: Vec<String> = mx_records.into_iter().map(|(_, host)| host).collect();
    if servers.is_empty() {
        warn!("No MX records found for {}, using A record", domain);
        return Ok(vec![domain.to_string()]);
    }
    Ok(servers)
}

/// Whether a domain has any MX or A/AAAA record. Used for inbound
/// sender-domain validation when enabled.
pub async fn domain_resolves(domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    if let Ok(lookup) = resolver.mx_lookup(domain).await {
        if lookup.iter().next().is_some() {
            return true;
        }
    }
    resolver
        .lookup_ip(domain)
        .await
        .map(|ips| ips.iter().next().is_some())
        .unwrap_or(false)
}
