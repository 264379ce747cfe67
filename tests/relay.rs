use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use relay_rtos::app::{self, CONSUMER_NAME, PRODUCER_NAME};
use relay_rtos::{Channel, Config, MemoryConsole, TaskState, Timeout};

fn values_with_prefix(lines: &[String], prefix: &str) -> Vec<i32> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix(prefix))
        .map(|v| v.parse().expect("console value is an integer"))
        .collect()
}

#[test]
fn relay_delivers_every_value_in_order() {
    let config = Config {
        period_ms: 20,
        ..Config::default()
    };
    let console = Arc::new(MemoryConsole::new());
    let (kernel, channel) = app::build(&config, console.clone()).unwrap();
    let running = kernel.start().unwrap();

    let start = Instant::now();
    loop {
        let lines = console.lines();
        let received = values_with_prefix(&lines, &format!("{CONSUMER_NAME} (received): "));
        if received.len() >= 5 {
            break;
        }
        assert!(start.elapsed() < Duration::from_secs(10), "relay stalled: {lines:?}");
        thread::sleep(Duration::from_millis(5));
    }

    let lines = console.lines();
    let sent = values_with_prefix(&lines, &format!("{PRODUCER_NAME} (sent): "));
    let received = values_with_prefix(&lines, &format!("{CONSUMER_NAME} (received): "));

    // Either side may print first within a cycle; compare the common prefix.
    let common = sent.len().min(received.len());
    assert!(common >= 4);
    assert_eq!(sent[..common], received[..common]);
    assert!(received.iter().all(|&v| v >= 0));
    assert!(channel.len() <= 1);

    // Both tasks are still looping
    for (name, state) in running.task_states() {
        assert_eq!(state, TaskState::Running, "{name} stopped");
    }
}

#[test]
fn scenario_send_then_receive() {
    let channel = Channel::new();
    channel.send(42, Timeout::Forever).unwrap();
    assert_eq!(channel.receive(Timeout::Forever).unwrap(), 42);
    assert!(channel.is_empty());
}

#[test]
fn scenario_blocked_receive_released_by_send() {
    let channel = Arc::new(Channel::new());
    let reader = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || channel.receive(Timeout::Forever).unwrap())
    };

    let start = Instant::now();
    while channel.waiting_receivers() == 0 {
        assert!(start.elapsed() < Duration::from_secs(5));
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(20));
    assert!(!reader.is_finished());

    channel.send(7, Timeout::Forever).unwrap();
    assert_eq!(reader.join().unwrap(), 7);
}

#[test]
fn scenario_second_send_times_out() {
    let channel = Channel::new();
    channel.send(1, Timeout::Forever).unwrap();
    let err = channel
        .send(2, Timeout::After(Duration::from_millis(25)))
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(channel.peek(), Some(1));
}

#[test]
fn scenario_thousand_cycles_in_order() {
    let channel = Arc::new(Channel::new());
    let producer = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || {
            for i in 0..1000 {
                channel.send(i, Timeout::Forever).unwrap();
            }
        })
    };

    let observed: Vec<i32> = (0..1000)
        .map(|_| channel.receive(Timeout::Forever).unwrap())
        .collect();
    producer.join().unwrap();
    assert_eq!(observed, (0..1000).collect::<Vec<_>>());
}
