//! STOMP client tests against a scripted in-process server.

use std::io::{BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use artemis_relay::bus::{BusError, ConnectionFactory};
use artemis_relay::stomp::frame::{read_frame, Command, Frame};
use artemis_relay::stomp::{
    BrokerAddress, ConnectionOptions, Credentials, StompConnectionFactory,
};

use crate::support::wait_until;

/// How the scripted server answers.
#[derive(Clone, Default)]
struct Script {
    /// Only this login is accepted.
    login: Option<String>,
    /// SEND to this destination is answered with ERROR.
    reject_destination: Option<String>,
    /// Payloads delivered to each new subscription.
    deliver: Vec<String>,
    /// Drop the connection right after confirming a COMMIT.
    close_after_commit: bool,
    /// `heart-beat` header sent in CONNECTED.
    heart_beat: Option<String>,
    /// Drop the connection when the client is silent this long.
    idle_timeout: Option<Duration>,
}

struct FakeBroker {
    address: BrokerAddress,
    frames: Arc<Mutex<Vec<Frame>>>,
    connects: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeBroker {
    fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let connects = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));

        let (recorded, counted, hung_up) = (frames.clone(), connects.clone(), closed.clone());
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let (script, recorded, counted, hung_up) =
                    (script.clone(), recorded.clone(), counted.clone(), hung_up.clone());
                thread::spawn(move || {
                    serve(stream, script, recorded, counted);
                    hung_up.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            address: BrokerAddress {
                host: "127.0.0.1".into(),
                port,
            },
            frames,
            connects,
            closed,
        }
    }

    fn factory(&self, credentials: Credentials) -> StompConnectionFactory {
        self.factory_with_heartbeat(credentials, Duration::ZERO)
    }

    fn factory_with_heartbeat(
        &self,
        credentials: Credentials,
        heartbeat: Duration,
    ) -> StompConnectionFactory {
        let options = ConnectionOptions {
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(2),
            virtual_host: None,
            heartbeat,
        };
        StompConnectionFactory::new(self.address.clone(), credentials, options, 4)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn frames(&self, command: Command) -> Vec<Frame> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.command == command)
            .cloned()
            .collect()
    }

    fn commands(&self) -> Vec<Command> {
        self.frames.lock().unwrap().iter().map(|f| f.command).collect()
    }
}

fn serve(stream: TcpStream, script: Script, frames: Arc<Mutex<Vec<Frame>>>, connects: Arc<AtomicUsize>) {
    stream.set_read_timeout(script.idle_timeout).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let mut delivered = 0;

    while let Ok(Some(frame)) = read_frame(&mut reader) {
        frames.lock().unwrap().push(frame.clone());

        let reply = match frame.command {
            Command::Connect => {
                connects.fetch_add(1, Ordering::SeqCst);
                let accepted = match &script.login {
                    Some(login) => frame.get("login") == Some(login.as_str()),
                    None => true,
                };
                if !accepted {
                    let error = Frame::new(Command::Error)
                        .header("message", "AMQ229031: Unable to validate user");
                    let _ = error.write_to(&mut writer);
                    return;
                }
                Frame::new(Command::Connected)
                    .header("version", "1.2")
                    .header("session", "fake-session")
                    .header_opt("heart-beat", script.heart_beat.as_deref())
            }
            Command::Send if frame.get("destination") == script.reject_destination.as_deref() => {
                let error = Frame::new(Command::Error)
                    .header("message", "AMQ229032: not authorized to send")
                    .header_opt("receipt-id", frame.get("receipt"));
                let _ = error.write_to(&mut writer);
                return;
            }
            _ => match frame.get("receipt") {
                Some(receipt) => Frame::new(Command::Receipt).header("receipt-id", receipt),
                None => continue,
            },
        };
        if reply.write_to(&mut writer).is_err() {
            return;
        }

        if frame.command == Command::Subscribe {
            for payload in &script.deliver {
                delivered += 1;
                let message = Frame::new(Command::Message)
                    .header("subscription", frame.get("id").unwrap_or_default())
                    .header("message-id", format!("msg-{delivered}"))
                    .header("destination", frame.get("destination").unwrap_or_default())
                    .header("ack", format!("ack-{delivered}"))
                    .with_body(payload.as_str());
                let _ = message.write_to(&mut writer);
            }
        }
        if frame.command == Command::Disconnect
            || (frame.command == Command::Commit && script.close_after_commit)
        {
            let _ = writer.flush();
            return;
        }
    }
}

#[test]
fn send_runs_in_its_own_transaction() {
    let broker = FakeBroker::start(Script::default());
    let factory = broker.factory(Credentials::new("admin", "admin"));

    factory.sender().send("component2.queue", "hello").unwrap();

    let commands: Vec<Command> = broker
        .commands()
        .into_iter()
        .filter(|c| *c != Command::Disconnect)
        .collect();
    assert_eq!(
        commands,
        vec![Command::Connect, Command::Begin, Command::Send, Command::Commit]
    );

    let connect = &broker.frames(Command::Connect)[0];
    assert_eq!(connect.get("accept-version"), Some("1.2"));
    assert_eq!(connect.get("login"), Some("admin"));
    assert_eq!(connect.get("passcode"), Some("admin"));

    let begin = &broker.frames(Command::Begin)[0];
    let send = &broker.frames(Command::Send)[0];
    let commit = &broker.frames(Command::Commit)[0];
    let transaction = begin.get("transaction").unwrap();
    assert_eq!(send.get("transaction"), Some(transaction));
    assert_eq!(commit.get("transaction"), Some(transaction));

    assert_eq!(send.get("destination"), Some("component2.queue"));
    assert_eq!(send.get("persistent"), Some("true"));
    assert_eq!(send.get("destination-type"), Some("ANYCAST"));
    assert_eq!(send.body_text().unwrap(), "hello");
}

#[test]
fn connections_are_reused_between_sends() {
    let broker = FakeBroker::start(Script::default());
    let factory = broker.factory(Credentials::anonymous());

    let sender = factory.sender();
    sender.send("q", "one").unwrap();
    sender.send("q", "two").unwrap();
    sender.send("q", "three").unwrap();

    assert_eq!(broker.connects.load(Ordering::SeqCst), 1);
    assert_eq!(broker.frames(Command::Commit).len(), 3);
    assert_eq!(factory.pool().idle_count(), 1);
}

#[test]
fn rejected_login_is_an_authentication_error() {
    let broker = FakeBroker::start(Script {
        login: Some("admin".into()),
        ..Script::default()
    });
    let factory = broker.factory(Credentials::new("intruder", "guess"));

    let err = factory.sender().send("q", "x").unwrap_err();
    match err {
        BusError::Authentication(message) => assert!(message.contains("AMQ229031")),
        other => panic!("expected authentication error, got {other}"),
    }
    assert_eq!(factory.pool().idle_count(), 0);
}

#[test]
fn broker_error_on_send_discards_the_connection() {
    let broker = FakeBroker::start(Script {
        reject_destination: Some("forbidden".into()),
        ..Script::default()
    });
    let factory = broker.factory(Credentials::anonymous());
    let sender = factory.sender();

    let err = sender.send("forbidden", "x").unwrap_err();
    assert!(matches!(err, BusError::Rejected(ref m) if m.contains("not authorized")));
    assert_eq!(factory.pool().idle_count(), 0);

    // The next send opens a fresh connection.
    sender.send("allowed", "y").unwrap();
    assert_eq!(broker.connects.load(Ordering::SeqCst), 2);
    assert_eq!(factory.pool().idle_count(), 1);
}

#[test]
fn unreachable_broker_is_a_connection_failure() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let factory = StompConnectionFactory::from_url(
        &format!("tcp://127.0.0.1:{port}"),
        Credentials::anonymous(),
        ConnectionOptions::default(),
        1,
    )
    .unwrap();

    let err = factory.sender().send("q", "x").unwrap_err();
    assert!(matches!(err, BusError::ConnectionFailed(_)), "got {err}");
}

#[test]
fn listener_session_acks_and_nacks_by_ack_header() {
    let broker = FakeBroker::start(Script {
        deliver: vec!["first".into(), "second".into()],
        ..Script::default()
    });
    let factory = broker.factory(Credentials::new("admin", "admin"));

    let mut session = factory.listener().open("weblogic.input.queue").unwrap();

    let subscribe = &broker.frames(Command::Subscribe)[0];
    assert_eq!(subscribe.get("destination"), Some("weblogic.input.queue"));
    assert_eq!(subscribe.get("ack"), Some("client-individual"));

    let first = session.receive(Duration::from_secs(2)).unwrap().unwrap();
    assert_eq!(first.payload, "first");
    assert_eq!(first.id, "msg-1");
    assert_eq!(first.destination, "weblogic.input.queue");
    session.commit(&first).unwrap();

    let second = session.receive(Duration::from_secs(2)).unwrap().unwrap();
    assert_eq!(second.payload, "second");
    session.rollback(&second, "handler failed").unwrap();

    assert!(session.receive(Duration::from_millis(50)).unwrap().is_none());

    assert_eq!(broker.frames(Command::Ack)[0].get("id"), Some("ack-1"));
    assert_eq!(broker.frames(Command::Nack)[0].get("id"), Some("ack-2"));

    drop(session);
    assert!(wait_until(Duration::from_secs(2), || {
        !broker.frames(Command::Disconnect).is_empty()
    }));
    let commands = broker.commands();
    assert_eq!(&commands[commands.len() - 2..], &[Command::Unsubscribe, Command::Disconnect]);
    let subscription = subscribe.get("id").unwrap();
    assert_eq!(broker.frames(Command::Unsubscribe)[0].get("id"), Some(subscription));
}

#[test]
fn connection_closed_by_broker_while_cached_is_replaced() {
    let broker = FakeBroker::start(Script {
        close_after_commit: true,
        ..Script::default()
    });
    let factory = broker.factory(Credentials::anonymous());
    let sender = factory.sender();

    for (round, payload) in ["one", "two", "three"].into_iter().enumerate() {
        sender.send("component4.queue", payload).unwrap();
        assert!(wait_until(Duration::from_secs(2), || broker.closed() == round + 1));
    }

    assert_eq!(broker.connects.load(Ordering::SeqCst), 3);
    let sent: Vec<String> = broker
        .frames(Command::Send)
        .iter()
        .map(|f| f.body_text().unwrap().to_string())
        .collect();
    assert_eq!(sent, vec!["one", "two", "three"]);
}

#[test]
fn heartbeats_keep_an_idle_subscription_open() {
    let script = Script {
        heart_beat: Some("0,50".into()),
        idle_timeout: Some(Duration::from_millis(300)),
        ..Script::default()
    };
    let broker = FakeBroker::start(script);
    let factory = broker.factory_with_heartbeat(Credentials::anonymous(), Duration::from_millis(50));

    let mut session = factory.listener().open("component2.queue").unwrap();
    let connect = &broker.frames(Command::Connect)[0];
    assert_eq!(connect.get("heart-beat"), Some("50,0"));

    let started = Instant::now();
    assert!(session.receive(Duration::from_millis(900)).unwrap().is_none());
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert!(session.receive(Duration::from_millis(100)).unwrap().is_none());
    assert_eq!(broker.closed(), 0);
    assert_eq!(broker.connects.load(Ordering::SeqCst), 1);
}

#[test]
fn silent_subscription_is_dropped_without_heartbeats() {
    let broker = FakeBroker::start(Script {
        idle_timeout: Some(Duration::from_millis(200)),
        ..Script::default()
    });
    let factory = broker.factory(Credentials::anonymous());

    let mut session = factory.listener().open("component2.queue").unwrap();
    assert_eq!(broker.frames(Command::Connect)[0].get("heart-beat"), Some("0,0"));

    assert!(matches!(
        session.receive(Duration::from_millis(900)),
        Err(BusError::Closed)
    ));
    assert!(wait_until(Duration::from_secs(2), || broker.closed() == 1));
}
