//! Line-delimited JSON protocol between clients and the ledger server.
//!
//! Each request is one JSON object on its own line; the server answers with
//! exactly one JSON line. A malformed line gets an `error` response and the
//! connection stays open.

use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use ulid::Ulid;

use crate::error::Error;
use crate::ledger::Ledger;
use crate::limits::MAX_FRAME_LEN;
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    ListResources,
    ListBookings,
    CreateResource {
        label: String,
        capacity: u32,
        #[serde(default)]
        location: Option<String>,
    },
    CreateBooking { details: BookingDetails },
    UpdateBooking { id: Ulid, details: BookingDetails },
    DeleteBooking { id: Ulid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Resources { resources: Vec<Resource> },
    Bookings { bookings: Vec<Booking> },
    Resource { resource: Resource },
    Booking { booking: Booking },
    Deleted { id: Ulid },
    Error { error: Error },
}

pub type LineFramed<S> = Framed<S, LinesCodec>;

/// Server side: request lines are capped at `MAX_FRAME_LEN`.
pub fn server_framed<S: AsyncRead + AsyncWrite>(stream: S) -> LineFramed<S> {
    Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LEN))
}

/// Client side: a response line carries whole listings, so it is only
/// bounded by the ledger's own resource and booking limits.
pub fn client_framed<S: AsyncRead + AsyncWrite>(stream: S) -> LineFramed<S> {
    Framed::new(stream, LinesCodec::new())
}

/// Run one request against the ledger.
pub async fn execute(ledger: &Ledger, req: Request) -> Response {
    let result = match req {
        Request::ListResources => Ok(Response::Resources {
            resources: ledger.list_resources().await,
        }),
        Request::ListBookings => Ok(Response::Bookings {
            bookings: ledger.list_bookings().await,
        }),
        Request::CreateResource { label, capacity, location } => ledger
            .add_resource(label, capacity, location)
            .await
            .map(|resource| Response::Resource { resource }),
        Request::CreateBooking { details } => ledger
            .create_booking(details)
            .await
            .map(|booking| Response::Booking { booking }),
        Request::UpdateBooking { id, details } => ledger
            .update_booking(id, details)
            .await
            .map(|booking| Response::Booking { booking }),
        Request::DeleteBooking { id } => ledger
            .cancel_booking(id)
            .await
            .map(|booking| Response::Deleted { id: booking.id }),
    };
    result.unwrap_or_else(|error| Response::Error { error })
}

/// Serve one client until it hangs up.
pub async fn process_connection<S>(stream: S, ledger: Arc<Ledger>) -> Result<(), LinesCodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = server_framed(stream);

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                tracing::warn!("request line exceeds {MAX_FRAME_LEN} bytes");
                let error = Error::LimitExceeded(format!("request longer than {MAX_FRAME_LEN} bytes"));
                send(&mut lines, &Response::Error { error }).await?;
                continue;
            }
            Err(e) => return Err(e),
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(req) => {
                let label = crate::observability::request_label(&req);
                tracing::debug!(request = label, "request");
                let start = Instant::now();
                let response = execute(&ledger, req).await;
                let status = match &response {
                    Response::Error { error } => error.kind(),
                    _ => "ok",
                };
                metrics::counter!(crate::observability::REQUESTS_TOTAL, "request" => label, "status" => status)
                    .increment(1);
                metrics::histogram!(crate::observability::REQUEST_DURATION_SECONDS, "request" => label)
                    .record(start.elapsed().as_secs_f64());
                response
            }
            Err(e) => {
                tracing::debug!("unparseable request: {e}");
                Response::Error {
                    error: Error::Transport(format!("bad request: {e}")),
                }
            }
        };
        send(&mut lines, &response).await?;
    }
    Ok(())
}

async fn send<S, T>(lines: &mut LineFramed<S>, msg: &T) -> Result<(), LinesCodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(msg)
        .map_err(|e| LinesCodecError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    lines.send(json).await
}

/// Client side: write one request, read one response.
pub async fn round_trip<S>(lines: &mut LineFramed<S>, req: &Request) -> Result<Response, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send(lines, req)
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    let line = lines
        .next()
        .await
        .ok_or_else(|| Error::Transport("connection closed before response".into()))?
        .map_err(|e| Error::Transport(e.to_string()))?;
    serde_json::from_str(&line).map_err(|e| Error::Transport(format!("bad response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use crate::error::{NotFound, ValidationError};

    fn test_wal_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("tableslot_test_wire");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn serve(name: &str) -> LineFramed<tokio::io::DuplexStream> {
        let ledger = Arc::new(
            Ledger::open(test_wal_path(name), Arc::new(ScheduleConfig::default())).unwrap(),
        );
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(process_connection(server, ledger));
        client_framed(client)
    }

    fn details(resource_id: Ulid, start: &str) -> BookingDetails {
        BookingDetails {
            resource_id,
            day: "tomorrow".into(),
            start_slot: start.into(),
            duration_minutes: 90,
            customer_name: "Lin".into(),
            customer_phone: "555-0142".into(),
            guest_count: 4,
            notes: None,
        }
    }

    #[test]
    fn request_json_shape() {
        let json = serde_json::to_string(&Request::DeleteBooking { id: Ulid::nil() }).unwrap();
        assert_eq!(
            json,
            r#"{"type":"delete_booking","id":"00000000000000000000000000"}"#
        );
        let req: Request = serde_json::from_str(r#"{"type":"list_resources"}"#).unwrap();
        assert_eq!(req, Request::ListResources);
        let req: Request =
            serde_json::from_str(r#"{"type":"create_resource","label":"2","capacity":4}"#).unwrap();
        assert_eq!(
            req,
            Request::CreateResource { label: "2".into(), capacity: 4, location: None }
        );
    }

    #[tokio::test]
    async fn create_list_delete_over_the_wire() {
        let mut conn = serve("crud.wal");

        let Response::Resource { resource } = round_trip(
            &mut conn,
            &Request::CreateResource { label: "7".into(), capacity: 6, location: None },
        )
        .await
        .unwrap() else {
            panic!("expected resource");
        };

        let resp = round_trip(
            &mut conn,
            &Request::CreateBooking { details: details(resource.id, "19:00") },
        )
        .await
        .unwrap();
        let Response::Booking { booking } = resp else {
            panic!("expected booking, got {resp:?}");
        };

        let resp = round_trip(&mut conn, &Request::ListBookings).await.unwrap();
        assert_eq!(resp, Response::Bookings { bookings: vec![booking.clone()] });

        let resp = round_trip(&mut conn, &Request::DeleteBooking { id: booking.id })
            .await
            .unwrap();
        assert_eq!(resp, Response::Deleted { id: booking.id });

        let resp = round_trip(&mut conn, &Request::DeleteBooking { id: booking.id })
            .await
            .unwrap();
        assert_eq!(
            resp,
            Response::Error { error: Error::NotFound(NotFound::Booking(booking.id)) }
        );
    }

    #[tokio::test]
    async fn errors_travel_as_structured_values() {
        let mut conn = serve("errors.wal");
        let Response::Resource { resource } = round_trip(
            &mut conn,
            &Request::CreateResource { label: "1".into(), capacity: 2, location: None },
        )
        .await
        .unwrap() else {
            panic!("expected resource");
        };

        let resp = round_trip(
            &mut conn,
            &Request::CreateBooking { details: details(resource.id, "19:00") },
        )
        .await
        .unwrap();
        assert!(matches!(
            resp,
            Response::Error { error: Error::Validation(ValidationError::OverCapacity { .. }) }
        ));
    }

    #[tokio::test]
    async fn garbage_line_keeps_connection_open() {
        let mut conn = serve("garbage.wal");
        conn.send("this is not json".to_string()).await.unwrap();
        let line = conn.next().await.unwrap().unwrap();
        let resp: Response = serde_json::from_str(&line).unwrap();
        assert!(matches!(resp, Response::Error { error: Error::Transport(_) }));

        let resp = round_trip(&mut conn, &Request::ListResources).await.unwrap();
        assert_eq!(resp, Response::Resources { resources: vec![] });
    }

    #[tokio::test]
    async fn oversized_request_is_refused() {
        let mut conn = serve("oversized.wal");
        conn.send("x".repeat(MAX_FRAME_LEN + 1)).await.unwrap();
        let line = conn.next().await.unwrap().unwrap();
        let resp: Response = serde_json::from_str(&line).unwrap();
        assert!(matches!(resp, Response::Error { error: Error::LimitExceeded(_) }));
    }

    #[tokio::test]
    async fn listing_larger_than_a_request_frame_reaches_the_client() {
        let mut conn = serve("big_listing.wal");
        let mut resources = Vec::new();
        for label in ["1", "2", "3", "4"] {
            let Response::Resource { resource } = round_trip(
                &mut conn,
                &Request::CreateResource { label: label.into(), capacity: 6, location: None },
            )
            .await
            .unwrap() else {
                panic!("expected resource");
            };
            resources.push(resource);
        }
        for resource in &resources {
            for day in ["today", "tomorrow"] {
                for start in ["17:00", "18:00", "19:00", "20:00", "21:00", "22:00"] {
                    let mut d = details(resource.id, start);
                    d.day = day.into();
                    d.duration_minutes = 60;
                    d.notes = Some("n".repeat(crate::limits::MAX_NOTES_LEN));
                    let resp = round_trip(&mut conn, &Request::CreateBooking { details: d })
                        .await
                        .unwrap();
                    assert!(matches!(resp, Response::Booking { .. }), "{resp:?}");
                }
            }
        }

        let resp = round_trip(&mut conn, &Request::ListBookings).await.unwrap();
        let Response::Bookings { bookings } = resp else {
            panic!("expected bookings, got {resp:?}");
        };
        assert_eq!(bookings.len(), 48);
        assert!(serde_json::to_string(&bookings).unwrap().len() > MAX_FRAME_LEN);
    }
}
