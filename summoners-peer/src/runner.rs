//! Fixed-rate peer loop.
//!
//! Each tick: poll the transport and hand the batch to the session, then
//! drain local input, then send whatever the session produced. Rendering
//! happens through a callback whenever the session's revision moves.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use summoners_core::{GameState, Location, Region, Team};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::layout::Layout;
use crate::session::{PeerSession, SessionError};
use crate::transport::{MemoryTransport, Transport};

/// A line of local input after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Pointer { x: i32, y: i32 },
    Quit,
}

/// Parse one line of terminal input.
///
/// Accepts `x y`, `(x, y)`, `x, y`, `cell <board|reserve1|reserve2> <row> <col>`
/// (clicked at the cell's centre), and `quit`.
pub fn parse_input(line: &str, layout: &Layout) -> Option<InputEvent> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("q") {
        return Some(InputEvent::Quit);
    }

    let words: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .filter(|w| !w.is_empty())
        .collect();

    match words.as_slice() {
        ["cell", region, row, col] => {
            let region = match *region {
                "board" => Region::Board,
                "reserve1" => Region::ReserveOne,
                "reserve2" => Region::ReserveTwo,
                _ => return None,
            };
            let loc = Location::new(region, row.parse().ok()?, col.parse().ok()?);
            if !loc.is_valid() {
                return None;
            }
            let (x, y) = layout.cell_center(loc);
            Some(InputEvent::Pointer { x, y })
        }
        [x, y] => Some(InputEvent::Pointer {
            x: x.parse().ok()?,
            y: y.parse().ok()?,
        }),
        _ => None,
    }
}

/// Read stdin on a plain thread so a pending read never holds up runtime
/// shutdown. The channel closes on EOF or after `quit`.
pub fn spawn_stdin_reader(layout: Layout) -> UnboundedReceiver<InputEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_input(&line, &layout) {
                Some(event) => {
                    if tx.send(event).is_err() || event == InputEvent::Quit {
                        break;
                    }
                }
                None => warn!(%line, "Unrecognized input"),
            }
        }
    });
    rx
}

async fn send_all(transport: &dyn Transport, messages: Vec<String>) -> Result<(), SessionError> {
    for text in messages {
        transport.send(&text).await?;
    }
    Ok(())
}

/// Poll the transport once and let the session react.
async fn poll_inbound(
    transport: &dyn Transport,
    session: &mut PeerSession,
) -> Result<(), SessionError> {
    let inbound = transport.recv().await?;
    let replies = session.handle_inbound(inbound)?;
    send_all(transport, replies).await
}

fn interval(tick: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Run one networked peer until quit, input EOF, interrupt or a fatal error.
pub async fn run_peer(
    transport: &dyn Transport,
    session: &mut PeerSession,
    input: &mut UnboundedReceiver<InputEvent>,
    running: &AtomicBool,
    tick: Duration,
    mut on_change: impl FnMut(&GameState),
) -> Result<(), SessionError> {
    info!(team = ?session.local_team(), "Peer session started");
    send_all(transport, session.start()).await?;
    on_change(session.game());

    let mut ticker = interval(tick);
    let mut seen = session.revision();
    let mut quitting = false;

    while !quitting && running.load(Ordering::SeqCst) {
        ticker.tick().await;
        poll_inbound(transport, session).await?;

        loop {
            match input.try_recv() {
                Ok(InputEvent::Pointer { x, y }) => {
                    let out = session.pointer(x, y);
                    send_all(transport, out).await?;
                }
                Ok(InputEvent::Quit) | Err(TryRecvError::Disconnected) => {
                    quitting = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        if session.revision() != seen {
            seen = session.revision();
            on_change(session.game());
        }
    }

    if quitting {
        info!("Input closed, leaving");
    } else {
        info!("Interrupted");
    }
    Ok(())
}

/// Both teams on one terminal: two sessions joined by an in-memory
/// transport, with each pointer event routed to whichever session holds
/// authority.
pub async fn run_hotseat(
    layout: Layout,
    input: &mut UnboundedReceiver<InputEvent>,
    running: &AtomicBool,
    tick: Duration,
    mut on_change: impl FnMut(&GameState),
) -> Result<(), SessionError> {
    let (link_one, link_two) = MemoryTransport::pair();
    let mut one = PeerSession::new(Team::PlayerOne, layout);
    let mut two = PeerSession::new(Team::PlayerTwo, layout);

    send_all(&link_two, two.start()).await?;
    on_change(one.game());

    let mut ticker = interval(tick);
    let mut seen = (one.revision(), two.revision());
    let mut quitting = false;

    while !quitting && running.load(Ordering::SeqCst) {
        ticker.tick().await;
        poll_inbound(&link_one, &mut one).await?;
        poll_inbound(&link_two, &mut two).await?;

        loop {
            match input.try_recv() {
                Ok(InputEvent::Pointer { x, y }) => {
                    if one.is_authoritative() {
                        let out = one.pointer(x, y);
                        send_all(&link_one, out).await?;
                    } else {
                        let out = two.pointer(x, y);
                        send_all(&link_two, out).await?;
                    }
                    // Authority may have just moved; both sides must agree
                    // before the next click is routed.
                    poll_inbound(&link_one, &mut one).await?;
                    poll_inbound(&link_two, &mut two).await?;
                }
                Ok(InputEvent::Quit) | Err(TryRecvError::Disconnected) => {
                    quitting = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let now = (one.revision(), two.revision());
        if now != seen {
            seen = now;
            let shown = if one.is_authoritative() { &one } else { &two };
            debug!(team = ?shown.local_team(), "Rendering");
            on_change(shown.game());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pointer_forms() {
        let layout = Layout::default();
        let expected = Some(InputEvent::Pointer { x: 410, y: 120 });
        assert_eq!(parse_input("410 120", &layout), expected);
        assert_eq!(parse_input("(410, 120)", &layout), expected);
        assert_eq!(parse_input("  410,120 ", &layout), expected);
    }

    #[test]
    fn test_parse_cell() {
        let layout = Layout::default();
        let (x, y) = layout.cell_center(Location::reserve(Region::ReserveTwo, 2));
        assert_eq!(
            parse_input("cell reserve2 0 2", &layout),
            Some(InputEvent::Pointer { x, y })
        );
        assert_eq!(parse_input("cell reserve2 1 0", &layout), None);
        assert_eq!(parse_input("cell attic 0 0", &layout), None);
    }

    #[test]
    fn test_parse_quit_and_garbage() {
        let layout = Layout::default();
        assert_eq!(parse_input("quit", &layout), Some(InputEvent::Quit));
        assert_eq!(parse_input("Q", &layout), Some(InputEvent::Quit));
        assert_eq!(parse_input("move knight", &layout), None);
        assert_eq!(parse_input("1 2 3", &layout), None);
    }

    #[tokio::test]
    async fn test_hotseat_plays_across_turns() {
        let layout = Layout::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cell = |row, col| {
            let (x, y) = layout.cell_center(Location::board(row, col));
            InputEvent::Pointer { x, y }
        };

        // PlayerOne spends a full turn, then PlayerTwo moves a Goblin.
        for (from, to) in [((1, 0), (2, 0)), ((1, 4), (2, 4)), ((1, 2), (2, 2)), ((3, 0), (3, 1))] {
            tx.send(cell(from.0, from.1)).unwrap();
            tx.send(cell(to.0, to.1)).unwrap();
        }
        tx.send(InputEvent::Quit).unwrap();

        let running = AtomicBool::new(true);
        let mut last = None;
        run_hotseat(layout, &mut rx, &running, Duration::from_millis(1), |game| {
            last = Some(game.clone())
        })
        .await
        .unwrap();

        let last = last.unwrap();
        assert_eq!(last.active_team(), Team::PlayerTwo);
        assert_eq!(last.moves_remaining(), 2);
        assert_eq!(
            last.piece_at(Location::board(3, 1)).map(|p| p.team),
            Some(Team::PlayerTwo)
        );
    }
}
