use anyhow::Context;

/// Default address of the puffin viewer endpoint.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8585";

/// Turn on profiling scopes and start a puffin server.
///
/// The returned server stops when dropped, so keep it alive for the lifetime of the app.
pub fn initialize(addr: &str) -> Result<puffin_http::Server, anyhow::Error> {
    profiling::puffin::set_scopes_on(true);
    let server = puffin_http::Server::new(addr)
        .with_context(|| format!("failed to start puffin server on {addr}"))?;
    log::info!("puffin server listening on {addr}");
    Ok(server)
}
