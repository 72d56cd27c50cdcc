//! Framing properties of the incremental response parser: results must not
//! depend on how the input bytes are fragmented, and pipelined responses
//! must come out in submission order.

use asyncagent::connection::{MachineEvent, RequestContext, ResponseMachine, StreamingMode};

fn buffered() -> RequestContext {
    RequestContext {
        head: false,
        mode: StreamingMode::Buffered,
    }
}

fn completions(events: Vec<MachineEvent>) -> Vec<asyncagent::Response> {
    events
        .into_iter()
        .filter_map(|e| match e {
            MachineEvent::Complete(r) => Some(r),
            _ => None,
        })
        .collect()
}

#[test]
fn content_length_framing_is_fragmentation_independent() {
    let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\nhello world";

    let mut burst = ResponseMachine::new();
    burst.begin(buffered());
    let from_burst = completions(burst.feed(wire));

    let mut trickle = ResponseMachine::new();
    trickle.begin(buffered());
    let mut from_trickle = Vec::new();
    for byte in wire.iter() {
        from_trickle.extend(completions(trickle.feed(std::slice::from_ref(byte))));
    }

    assert_eq!(from_burst.len(), 1);
    assert_eq!(from_burst, from_trickle);
    assert_eq!(from_burst[0].body, b"hello world");
}

#[test]
fn chunked_framing_is_fragmentation_independent() {
    let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                 4\r\nWiki\r\n5\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n";

    let mut burst = ResponseMachine::new();
    burst.begin(buffered());
    let from_burst = completions(burst.feed(wire));

    let mut trickle = ResponseMachine::new();
    trickle.begin(buffered());
    let mut from_trickle = Vec::new();
    for piece in wire.chunks(3) {
        from_trickle.extend(completions(trickle.feed(piece)));
    }

    assert_eq!(from_burst.len(), 1);
    assert_eq!(from_burst, from_trickle);
    assert_eq!(from_burst[0].body, b"Wikipedia in\r\n\r\nchunks.");
}

#[test]
fn chunked_completion_fires_exactly_once_on_the_zero_chunk() {
    let mut machine = ResponseMachine::new();
    machine.begin(buffered());

    let mut responses =
        completions(machine.feed(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n"));
    responses.extend(completions(machine.feed(b"4\r\nWiki\r\n")));
    assert!(responses.is_empty());

    responses.extend(completions(machine.feed(b"0\r\n\r\n")));
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].body, b"Wiki");
    assert!(machine.is_idle());
}

#[test]
fn pipelined_responses_in_one_burst_come_out_in_order() {
    let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\none\
                 HTTP/1.1 404 Not Found\r\nContent-Length: 3\r\n\r\ntwo\
                 HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nthree\r\n0\r\n\r\n";

    let mut machine = ResponseMachine::new();
    let mut responses = Vec::new();

    machine.begin(buffered());
    responses.extend(completions(machine.feed(wire)));
    // Bytes for the later responses are buffered; each begin re-parses them.
    machine.begin(buffered());
    responses.extend(completions(machine.drain()));
    machine.begin(buffered());
    responses.extend(completions(machine.drain()));

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].body, b"one");
    assert_eq!(responses[0].status_code, "200");
    assert_eq!(responses[1].body, b"two");
    assert_eq!(responses[1].status_code, "404");
    assert_eq!(responses[2].body, b"three");
    assert!(machine.is_idle());
}

#[test]
fn pipelined_responses_survive_fragmentation() {
    let wire: Vec<u8> = b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\na\
                          HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nb"
        .to_vec();

    let mut machine = ResponseMachine::new();
    machine.begin(buffered());
    let mut responses = Vec::new();
    for piece in wire.chunks(7) {
        for response in completions(machine.feed(piece)) {
            responses.push(response);
            if responses.len() == 1 {
                machine.begin(buffered());
                responses.extend(completions(machine.drain()));
            }
        }
    }

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].body, b"a");
    assert_eq!(responses[1].body, b"b");
}
