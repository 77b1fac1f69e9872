//! Session against a real TCP peer on the loopback interface.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use giftwire_protocol::{
    elements_named, CaptureEnd, Command, Endpoint, Identity, ReadPlan, Session, SessionError,
    INVENTORY_TERMINATOR, ITEM_TAG,
};

fn identity() -> Identity {
    Identity {
        login: "farmer".to_string(),
        key: "secret".to_string(),
        local_ip: "127.0.0.1".to_string(),
        client_version: "2.0".to_string(),
        version: "94".to_string(),
        lang: "en".to_string(),
    }
}

/// Reads one NUL-terminated frame.
fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    while stream.read(&mut byte).unwrap() == 1 {
        if byte[0] == 0 {
            break;
        }
        frame.push(byte[0]);
    }
    frame
}

#[test]
fn test_login_then_inventory_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let login = read_frame(&mut stream);
        assert!(login.starts_with(b"<LOGIN "));
        stream.write_all(b"<OK l=\"farmer\"/>\0").unwrap();

        let query = read_frame(&mut stream);
        assert_eq!(query, b"<GETME />".to_vec());
        // Split the response so the capture has to stitch chunks.
        stream
            .write_all(b"<MYPARAM><O id=\"1\" txt=\"Halloween box\" section=\"0\"/>")
            .unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(30));
        stream
            .write_all(b"<O id=\"2\" txt=\"Ammo\" section=\"2\" count=\"40\"/></MYPARAM>\0")
            .unwrap();

        // Hold the stream open until the client hangs up.
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
    });

    let endpoint = Endpoint::new("127.0.0.1", port);
    let mut session = Session::open(
        &endpoint,
        &identity(),
        Duration::from_secs(2),
        &ReadPlan::once(Duration::from_secs(2), 8192),
    )
    .unwrap();
    assert!(session.login_acknowledged());

    let capture = session
        .send(&Command::InventoryQuery)
        .unwrap()
        .receive_until(&ReadPlan::new(8, Duration::from_secs(2), 65_536).until(INVENTORY_TERMINATOR))
        .unwrap();
    assert_eq!(capture.end, CaptureEnd::Terminator);

    let items = elements_named(&capture.text(), ITEM_TAG);
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].parse_attr::<u32>("count"), Some(40));

    session.close();
    server.join().unwrap();
}

#[test]
fn test_unreachable_endpoint_is_connect_error() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let result = Session::open(
        &Endpoint::new("127.0.0.1", port),
        &identity(),
        Duration::from_millis(500),
        &ReadPlan::once(Duration::from_millis(100), 1024),
    );

    match result {
        Err(err @ SessionError::Connect { .. }) => {
            assert!(err.is_connect());
            assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
        }
        Err(other) => panic!("expected connect error, got {other}"),
        Ok(_) => panic!("connected to a closed port"),
    }
}
