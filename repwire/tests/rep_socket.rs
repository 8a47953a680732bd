//! REP socket integration tests over the inproc transport.
//!
//! Covers envelope round trips, strict alternation, reply routing to the
//! originating peer and lost-peer handling.

use repwire::prelude::*;
use std::io;
use std::time::{Duration, Instant};

fn request(body: &str) -> Message {
    Message::new().push_empty().push_str(body)
}

#[test]
fn test_minimal_request_reply() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-minimal")?;
    let req = connect_inproc("inproc://it-minimal")?;

    req.send(request("A"))?;
    let body = rep.try_recv()?.expect("request queued");
    assert_eq!(body, Message::from("A"));

    rep.send("B")?;
    assert_eq!(req.try_recv()?, Some(request("B")));
    assert_eq!(rep.state(), RepState::Idle);
    Ok(())
}

#[test]
fn test_multi_hop_envelope_is_preserved() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-multi-hop")?;
    let req = connect_inproc("inproc://it-multi-hop")?;

    req.send(
        Message::new()
            .push_str("X")
            .push_str("Y")
            .push_empty()
            .push_str("A"),
    )?;

    let body = rep.try_recv()?.expect("request queued");
    assert_eq!(body, Message::from("A"));
    let envelope = rep.pending_envelope().expect("reply owed");
    assert_eq!(envelope.addresses(), &[Bytes::from("X"), Bytes::from("Y")]);

    rep.send(Message::new().push_str("B").push_str("C"))?;
    let reply = req.try_recv()?.expect("reply queued");
    assert_eq!(
        reply,
        Message::new()
            .push_str("X")
            .push_str("Y")
            .push_empty()
            .push_str("B")
            .push_str("C")
    );

    let more: Vec<bool> = reply.frames().map(|f| f.more).collect();
    assert_eq!(more, vec![true, true, true, true, false]);
    Ok(())
}

#[test]
fn test_empty_body_round_trip() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-empty-body")?;
    let req = connect_inproc("inproc://it-empty-body")?;

    req.send(Message::new().push_empty())?;
    let body = rep.try_recv()?.expect("request queued");
    assert!(body.is_empty());

    rep.send(Message::new())?;
    assert_eq!(req.try_recv()?, Some(Message::new().push_empty()));
    Ok(())
}

#[test]
fn test_send_before_recv_is_rejected() {
    let mut rep = RepSocket::new();
    let err = rep.send("B").unwrap_err();
    assert!(matches!(err, RepError::ProtocolSequence { operation: "send", .. }));
    assert!(err.is_recoverable());
    assert_eq!(rep.state(), RepState::Idle);
}

#[test]
fn test_recv_twice_is_rejected_and_reply_still_owed() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-recv-twice")?;
    let req = connect_inproc("inproc://it-recv-twice")?;

    req.send(request("A"))?;
    req.send(request("second"))?;
    rep.try_recv()?.expect("request queued");

    let err = rep.try_recv().unwrap_err();
    assert!(matches!(err, RepError::ProtocolSequence { operation: "recv", .. }));
    assert_eq!(rep.state(), RepState::ReplyOwed);

    // The original obligation is untouched.
    rep.send("B")?;
    assert_eq!(req.try_recv()?, Some(request("B")));
    assert_eq!(rep.try_recv()?, Some(Message::from("second")));
    Ok(())
}

#[test]
fn test_reply_goes_only_to_originating_peer() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-origin")?;
    let first = connect_inproc("inproc://it-origin")?;
    let second = connect_inproc("inproc://it-origin")?;

    second.send(request("from-second"))?;
    let body = rep.try_recv()?.expect("request queued");
    rep.send(body)?;

    assert_eq!(first.try_recv()?, None);
    assert_eq!(second.try_recv()?, Some(request("from-second")));
    Ok(())
}

#[test]
fn test_reply_to_lost_peer_is_silently_dropped() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-lost-peer")?;
    let monitor = rep.monitor();
    let lost = connect_inproc("inproc://it-lost-peer")?;
    let bystander = connect_inproc("inproc://it-lost-peer")?;
    let lost_id = lost.id();

    lost.send(request("A"))?;
    rep.try_recv()?.expect("request queued");
    drop(lost);

    rep.send("B")?;
    assert_eq!(rep.state(), RepState::Idle);
    assert_eq!(bystander.try_recv()?, None);
    assert_eq!(rep.peer_count(), 1);

    let events: Vec<SocketEvent> = monitor.try_iter().collect();
    assert!(events.contains(&SocketEvent::PipeDetached(lost_id)));
    assert!(events.contains(&SocketEvent::ReplyDropped {
        pipe: lost_id,
        reason: DropReason::PeerGone,
    }));

    // The socket keeps serving.
    bystander.send(request("C"))?;
    assert_eq!(rep.try_recv()?, Some(Message::from("C")));
    Ok(())
}

#[test]
fn test_requests_of_disconnected_peer_are_discarded() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-discard")?;
    let gone = connect_inproc("inproc://it-discard")?;
    let stays = connect_inproc("inproc://it-discard")?;

    gone.send(request("never"))?;
    gone.close();
    stays.send(request("kept"))?;

    assert_eq!(rep.try_recv()?, Some(Message::from("kept")));
    rep.send("ok")?;
    assert_eq!(rep.try_recv()?, None);
    Ok(())
}

#[test]
fn test_peer_over_hwm_sees_backpressure() -> io::Result<()> {
    let options = SocketOptions::new().with_recv_hwm(2);
    let _rep = RepSocket::bind_with_options("inproc://it-hwm", options)?;
    let req = connect_inproc("inproc://it-hwm")?;

    req.send(request("1"))?;
    req.send(request("2"))?;
    assert!(matches!(req.send(request("3")), Err(RepError::Backpressure)));
    Ok(())
}

#[test]
fn test_close_detaches_peers_and_frees_endpoint() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-close")?;
    let monitor = rep.monitor();
    let req = connect_inproc("inproc://it-close")?;

    rep.close();
    assert!(req.is_detached());
    assert!(matches!(rep.try_recv(), Err(RepError::SocketClosed)));
    assert!(monitor.try_iter().any(|e| e == SocketEvent::Closed));

    // The endpoint can be bound again.
    let _again = RepSocket::bind("inproc://it-close")?;
    Ok(())
}

#[test]
fn test_dropped_socket_releases_endpoint() -> io::Result<()> {
    {
        let _rep = RepSocket::bind("inproc://it-drop")?;
        assert!(RepSocket::bind("inproc://it-drop").is_err());
    }
    let _rep = RepSocket::bind("inproc://it-drop")?;
    Ok(())
}

#[compio::test]
async fn test_recv_times_out_when_idle() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-timeout")?;
    let _req = connect_inproc("inproc://it-timeout")?;

    let start = Instant::now();
    let got = rep.recv_timeout(Some(Duration::from_millis(50))).await?;
    assert!(got.is_none());
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert_eq!(rep.state(), RepState::Idle);
    Ok(())
}

#[compio::test]
async fn test_recv_wakes_on_request_from_other_thread() -> io::Result<()> {
    let mut rep = RepSocket::bind("inproc://it-wake")?;
    let req = connect_inproc("inproc://it-wake")?;

    let requester = std::thread::spawn(move || -> repwire::Result<Option<Message>> {
        std::thread::sleep(Duration::from_millis(30));
        req.send(request("late"))?;
        req.recv_timeout(Duration::from_secs(5))
    });

    let body = rep
        .recv_timeout(Some(Duration::from_secs(5)))
        .await?
        .expect("request before deadline");
    assert_eq!(body, Message::from("late"));
    rep.send("done")?;

    let reply = requester.join().expect("requester thread panicked")?;
    assert_eq!(reply, Some(request("done")));
    Ok(())
}

#[compio::test]
async fn test_recv_uses_configured_timeout() -> io::Result<()> {
    let options = SocketOptions::new().with_recv_timeout(Duration::from_millis(20));
    let mut rep = RepSocket::with_options(options);
    assert!(rep.recv().await?.is_none());

    let (pipe, peer) = Pipe::pair(4, 4);
    rep.attach(pipe)?;
    peer.send(request("A"))?;
    assert_eq!(rep.recv().await?, Some(Message::from("A")));
    Ok(())
}
