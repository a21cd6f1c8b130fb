//! The notice handler (spec §4.4): drains a `tokio_postgres::Connection`
//! in the background, forwarding server notices to the host logger
//! with PostgreSQL severities mapped onto `log` levels, and keeping the
//! socket pumped for as long as the `Client` it came with is alive.

use tokio_postgres::AsyncMessage;

/// Spawns the connection driver, returning a handle the backend aborts
/// on `release`. Every `NOTICE`/`WARNING`/etc the server sends over
/// this connection is logged here; `Client::query`/`execute` callers
/// never see it.
pub(crate) fn spawn_connection<S, T>(
    mut connection: tokio_postgres::Connection<S, T>,
) -> tokio::task::JoinHandle<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    T: tokio_postgres::tls::TlsStream + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match std::future::poll_fn(|cx| connection.poll_message(cx)).await {
                Some(Ok(AsyncMessage::Notice(notice))) => log_notice(&notice),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::error!("postgres connection error: {}", e);
                    break;
                }
                None => break,
            }
        }
    })
}

/// Maps PostgreSQL severities onto log levels: `E`rror/`F`atal/`P`anic
/// become `error`, `W`arning becomes `warn`, and
/// `N`otice/`I`nfo/`L`og/`D`ebug become `debug` (spec §4.4 "Notice
/// handler").
fn log_notice(notice: &tokio_postgres::error::DbError) {
    let severity = notice.severity();
    match severity.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('E') | Some('F') | Some('P') => log::error!("postgres: {}", notice.message()),
        Some('W') => log::warn!("postgres: {}", notice.message()),
        _ => log::debug!("postgres: {}", notice.message()),
    }
}
