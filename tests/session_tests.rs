//! Session behaviour over mock devices: exchanges, timeouts and close.

mod common;

use common::{four_byte_exchange, session_over_mock, OptionsBuilder, TEST_POLL};
use pretty_assertions::assert_eq;
use serial_session::port::{FixedEnumerator, PortDescriptor, PortEnumerator};
use serial_session::{ErrorKind, MockSerialPort, PortError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_increment_echo_exchange() {
    let mock = MockSerialPort::increment_echo("MOCK0");
    let session = session_over_mock(&mock, four_byte_exchange("MOCK0"));

    assert_eq!(session.write(&[0x00, 0x17, 0xFE, 0xFF]).unwrap(), 4);
    let mut reply = [0u8; 4];
    assert_eq!(session.read(&mut reply).unwrap(), 4);
    assert_eq!(reply, [0x01, 0x18, 0xFF, 0x00]);

    session.close().unwrap();
}

#[test]
fn test_reply_split_across_chunks_is_accumulated() {
    let mock = MockSerialPort::increment_echo("MOCK0");
    mock.set_chunk_size(Some(1));
    let session = session_over_mock(&mock, four_byte_exchange("MOCK0"));

    session.write_all(&[0x10, 0x20, 0x30, 0x40]).unwrap();
    let mut reply = [0u8; 4];
    assert_eq!(session.read(&mut reply).unwrap(), 4);
    assert_eq!(reply, [0x11, 0x21, 0x31, 0x41]);
}

#[test]
fn test_read_returns_short_count_at_deadline() {
    let mock = MockSerialPort::new("MOCK0");
    mock.enqueue_read(&[0xAA, 0xBB]);
    let session = session_over_mock(
        &mock,
        OptionsBuilder::new("MOCK0").minimum(4).timeout_ms(100).build(),
    );

    let start = Instant::now();
    let mut buffer = [0u8; 4];
    let n = session.read(&mut buffer).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(n, 2);
    assert_eq!(&buffer[..2], &[0xAA, 0xBB]);
    assert!(elapsed >= Duration::from_millis(100), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "overshot: {elapsed:?}");
}

#[test]
fn test_silent_device_times_out_with_zero() {
    let mock = MockSerialPort::new("MOCK0");
    let session = session_over_mock(
        &mock,
        OptionsBuilder::new("MOCK0").minimum(4).timeout_ms(50).build(),
    );

    let mut buffer = [0u8; 4];
    assert_eq!(session.read(&mut buffer).unwrap(), 0);
    assert!(!session.is_closed());
}

#[test]
fn test_late_data_arrives_before_deadline() {
    let mock = MockSerialPort::new("MOCK0");
    mock.enqueue_read_after(Duration::from_millis(30), b"late");
    let session = session_over_mock(&mock, four_byte_exchange("MOCK0"));

    let mut buffer = [0u8; 4];
    assert_eq!(session.read(&mut buffer).unwrap(), 4);
    assert_eq!(&buffer, b"late");
}

#[test]
fn test_close_twice_reports_session_closed() {
    let mock = MockSerialPort::new("MOCK0");
    let session = session_over_mock(&mock, four_byte_exchange("MOCK0"));

    session.close().unwrap();
    let err = session.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionClosed);
    assert_eq!(mock.handle_count(), 1);
}

#[test]
fn test_concurrent_close_unblocks_reader() {
    let mock = MockSerialPort::new("MOCK0");
    let session = Arc::new(session_over_mock(
        &mock,
        OptionsBuilder::new("MOCK0").minimum(4).build(),
    ));

    let reader = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            let mut buffer = [0u8; 4];
            let start = Instant::now();
            (session.read(&mut buffer), start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(50));
    let closed_at = Instant::now();
    session.close().unwrap();
    let close_took = closed_at.elapsed();

    let (result, _) = reader.join().unwrap();
    assert!(matches!(result, Err(PortError::SessionClosed)));
    assert!(close_took < TEST_POLL * 50, "close blocked for {close_took:?}");
    assert_eq!(mock.handle_count(), 1);
}

#[test]
fn test_concurrent_close_unblocks_writer() {
    let mock = MockSerialPort::new("MOCK0");
    mock.set_stall_writes(true);
    let session = Arc::new(session_over_mock(&mock, OptionsBuilder::new("MOCK0").build()));

    let writer = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.write(b"stuck"))
    };

    thread::sleep(Duration::from_millis(50));
    let closed_at = Instant::now();
    session.close().unwrap();

    let result = writer.join().unwrap();
    let unblocked_after = closed_at.elapsed();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::SessionClosed);
    assert!(
        unblocked_after < TEST_POLL * 50,
        "writer took {unblocked_after:?} to notice close"
    );
    assert!(mock.written_bytes().is_empty());
    assert_eq!(mock.handle_count(), 1);
}

#[test]
fn test_reader_and_writer_threads_share_session() {
    let mock = MockSerialPort::loopback("MOCK0");
    let session = Arc::new(session_over_mock(
        &mock,
        OptionsBuilder::new("MOCK0").minimum(64).timeout_ms(2000).build(),
    ));

    let reader = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            let mut buffer = [0u8; 64];
            let n = session.read(&mut buffer).unwrap();
            buffer[..n].to_vec()
        })
    };

    let data: Vec<u8> = (0u8..64).collect();
    for chunk in data.chunks(8) {
        session.write_all(chunk).unwrap();
        thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(reader.join().unwrap(), data);
    session.close().unwrap();
}

#[test]
fn test_operations_after_close_fail() {
    let mock = MockSerialPort::loopback("MOCK0");
    let session = session_over_mock(&mock, four_byte_exchange("MOCK0"));
    session.close().unwrap();

    assert_eq!(session.write(b"x").unwrap_err().kind(), ErrorKind::SessionClosed);
    assert_eq!(
        session.read(&mut [0u8; 1]).unwrap_err().kind(),
        ErrorKind::SessionClosed
    );
    assert!(session.is_closed());
}

#[test]
fn test_enumerator_with_no_devices() {
    let enumerator = FixedEnumerator::default();
    assert!(enumerator.list().is_empty());

    let enumerator = FixedEnumerator::new(vec![
        PortDescriptor::named("/dev/ttyACM0"),
        PortDescriptor::named("/dev/ttyUSB0"),
    ]);
    let names: Vec<_> = enumerator.list().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["/dev/ttyACM0", "/dev/ttyUSB0"]);
}
