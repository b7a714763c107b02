use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use linewire_channel::{ChannelConfig, TextChannel, TextEncoding};
use linewire_transport::{connect, Endpoint, Listener};
use tokio::runtime::Runtime;

const THREADS: usize = 8;
const PER_THREAD: usize = 50;

struct Loopback {
    client: TextChannel,
    server: TextChannel,
}

fn loopback(runtime: &Runtime, name: &str) -> Loopback {
    runtime.block_on(async {
        let endpoint: Endpoint = "127.0.0.1:0".parse().expect("endpoint should parse");
        let mut listener = Listener::bind(&endpoint)
            .await
            .expect("listener should bind");
        let local = listener.local_endpoint().expect("bound endpoint");

        let (accepted, connected) = tokio::join!(listener.accept(), connect(&local));
        let server = accepted.expect("accept should succeed");
        let client = connected.expect("connect should succeed");

        Loopback {
            client: TextChannel::with_config(
                client,
                TextEncoding::Utf8,
                ChannelConfig::labeled(format!("{name}-client")),
            )
            .expect("client channel"),
            server: TextChannel::with_config(
                server,
                TextEncoding::Utf8,
                ChannelConfig::labeled(format!("{name}-server")),
            )
            .expect("server channel"),
        }
    })
}

/// Blast `THREADS * PER_THREAD` lines from plain OS threads and collect them
/// on the other side, reporting the lines in arrival order.
fn drive(link: &Loopback, tag: &'static str) -> thread::JoinHandle<Vec<String>> {
    let (tx, rx) = mpsc::channel::<String>();
    let total = THREADS * PER_THREAD;

    for _ in 0..total {
        let tx = tx.clone();
        link.server.receive_line(move |result| {
            let line = result
                .expect("receive should succeed")
                .expect("stream should stay open");
            let _ = tx.send(line);
        });
    }

    for t in 0..THREADS {
        let client = link.client.clone();
        thread::spawn(move || {
            for i in 0..PER_THREAD {
                client.send(&format!("{tag}:{t}:{i}\n"), |result| {
                    result.expect("send should succeed");
                });
            }
        });
    }

    thread::spawn(move || {
        (0..total)
            .map(|_| {
                rx.recv_timeout(Duration::from_secs(10))
                    .expect("line should arrive")
            })
            .collect()
    })
}

fn assert_per_thread_order(lines: &[String], tag: &str) {
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    for t in 0..THREADS {
        let prefix = format!("{tag}:{t}:");
        let seen: Vec<usize> = lines
            .iter()
            .filter_map(|line| line.strip_prefix(&prefix))
            .map(|i| i.parse().expect("index"))
            .collect();
        assert_eq!(seen, (0..PER_THREAD).collect::<Vec<_>>());
    }
    assert!(lines.iter().all(|line| line.starts_with(tag)));
}

#[test]
fn two_channels_driven_from_many_threads_stay_independent() {
    let runtime = Runtime::new().expect("runtime should start");
    let a = loopback(&runtime, "a");
    let b = loopback(&runtime, "b");

    let from_a = drive(&a, "alpha");
    let from_b = drive(&b, "beta");

    let lines_a = from_a.join().expect("collector a");
    let lines_b = from_b.join().expect("collector b");
    assert_per_thread_order(&lines_a, "alpha");
    assert_per_thread_order(&lines_b, "beta");

    assert_eq!(a.server.pending_receives(), 0);
    assert_eq!(b.server.pending_receives(), 0);
}

#[test]
fn stalled_channel_does_not_block_another() {
    let runtime = Runtime::new().expect("runtime should start");
    let stalled = loopback(&runtime, "stalled");
    let live = loopback(&runtime, "live");

    // Nothing is ever written to `stalled`, so these stay pending.
    for _ in 0..10 {
        stalled.server.receive_line(|_| {});
    }

    let (tx, rx) = mpsc::channel();
    live.server.receive_line(move |result| {
        let _ = tx.send(result);
    });
    live.client.send("ping\n", |_| {});

    let got = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("live channel should answer")
        .expect("receive should succeed");
    assert_eq!(got.as_deref(), Some("ping"));
    assert_eq!(stalled.server.pending_receives(), 10);

    stalled.server.shutdown();
    stalled.client.shutdown();
    live.server.shutdown();
    live.client.shutdown();
}
