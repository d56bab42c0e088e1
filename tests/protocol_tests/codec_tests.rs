//! Codec Tests
//!
//! Tests for request and response encoding/decoding.

use std::io::Cursor;
use tyrantkv::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, status_error, write_command, write_response, Arg, CommandKind, ErrorCode,
    Reply, Request, Response, Value, MAX_FIELD_SIZE,
};
use tyrantkv::TyrantError;

// =============================================================================
// Request Encoding/Decoding Tests
// =============================================================================

fn round_trip(request: &Request<'_>) -> Vec<Value> {
    let encoded = encode_command(request).unwrap();
    let (kind, values, used) = decode_command(&encoded).unwrap();
    assert_eq!(kind, request.kind);
    assert_eq!(used, encoded.len());
    values
}

#[test]
fn test_encode_decode_put() {
    let values = round_trip(&Request::put(b"mykey", b"myvalue"));
    assert_eq!(values, vec![Value::Bytes(b"mykey".to_vec()), Value::Bytes(b"myvalue".to_vec())]);
}

#[test]
fn test_encode_decode_empty_key_and_value() {
    let values = round_trip(&Request::put(b"", b""));
    assert_eq!(values, vec![Value::Bytes(Vec::new()), Value::Bytes(Vec::new())]);
}

#[test]
fn test_encode_decode_all_byte_values() {
    let all: Vec<u8> = (0..=255).collect();
    let values = round_trip(&Request::put(&all, &all));
    assert_eq!(values[0].as_bytes(), Some(all.as_slice()));
    assert_eq!(values[1].as_bytes(), Some(all.as_slice()));
}

#[test]
fn test_encode_decode_numeric_extremes() {
    for num in [0, 1, -1, i32::MIN, i32::MAX] {
        let values = round_trip(&Request::addint(b"n", num));
        assert_eq!(values[1], Value::I32(num));
    }

    let values = round_trip(&Request::setmst(b"host", 65535, u64::MAX, 0));
    assert_eq!(values[1], Value::U32(65535));
    assert_eq!(values[2], Value::U64(u64::MAX));
}

#[test]
fn test_encode_decode_adddouble() {
    let values = round_trip(&Request::adddouble(b"d", -2.25));
    assert_eq!(values[1], Value::I64(-2));
    assert_eq!(values[2], Value::I64(-250_000_000_000));
}

#[test]
fn test_encode_decode_mget() {
    let values = round_trip(&Request::mget(vec![b"a".as_slice(), b"".as_slice(), b"ccc".as_slice()]));
    assert_eq!(
        values,
        vec![Value::List(vec![b"a".to_vec(), Vec::new(), b"ccc".to_vec()])]
    );
}

#[test]
fn test_encode_decode_misc() {
    let values = round_trip(&Request::misc(b"put", 1, vec![b"pk".as_slice(), b"col".as_slice(), b"v".as_slice()]));
    match &values[..] {
        [Value::Bytes(name), Value::U32(opts), Value::List(args)] => {
            assert_eq!(name, b"put");
            assert_eq!(*opts, 1);
            assert_eq!(args.len(), 3);
        }
        _ => panic!("Expected MISC arguments"),
    }
}

#[test]
fn test_every_command_round_trips() {
    let requests = [
        Request::put(b"k", b"v"),
        Request::putkeep(b"k", b"v"),
        Request::putcat(b"k", b"v"),
        Request::putshl(b"k", b"v", 4),
        Request::putnr(b"k", b"v"),
        Request::out(b"k"),
        Request::get(b"k"),
        Request::mget(vec![b"k".as_slice()]),
        Request::vsiz(b"k"),
        Request::iterinit(),
        Request::iternext(),
        Request::fwmkeys(b"p", -1),
        Request::addint(b"k", 1),
        Request::adddouble(b"k", 1.5),
        Request::ext(b"fn", 0, b"k", b"v"),
        Request::sync(),
        Request::optimize(b"#bnum=1000"),
        Request::vanish(),
        Request::copy(b"/tmp/backup"),
        Request::restore(b"/var/ulog", 17, 1),
        Request::setmst(b"master", 1978, 0, 0),
        Request::rnum(),
        Request::size(),
        Request::stat(),
        Request::misc(b"genuid", 0, Vec::new()),
    ];

    let mut kinds: Vec<CommandKind> = Vec::new();
    for request in &requests {
        let values = round_trip(request);
        let restored: Vec<Arg<'_>> = values.iter().map(Value::as_arg).collect();
        assert_eq!(restored, request.args, "{}", request.kind);
        kinds.push(request.kind);
    }
    assert_eq!(kinds, CommandKind::ALL.to_vec());
}

#[test]
fn test_decode_rejects_bad_magic() {
    let mut encoded = encode_command(&Request::get(b"k")).unwrap().to_vec();
    encoded[0] = 0x00;
    assert!(decode_command(&encoded).is_err());
}

#[test]
fn test_decode_rejects_unknown_command() {
    assert!(decode_command(&[0xc8, 0xff]).is_err());
}

#[test]
fn test_argument_too_large_detected_before_encoding() {
    let value = vec![0u8; 64];
    let mut buf = Vec::new();
    let err = write_command(&mut buf, &Request::put(b"k", &value), 63).unwrap_err();
    assert!(matches!(err, TyrantError::ArgumentTooLarge { len: 64, max: 63, .. }));
    assert!(buf.is_empty());
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_blob_response() {
    let response = Response::ok(Reply::Blob(b"hello world".to_vec()));
    let encoded = encode_response(CommandKind::Get, &response).unwrap();
    let (decoded, used) = decode_response(CommandKind::Get, &encoded).unwrap();
    assert_eq!(decoded, response);
    assert_eq!(used, encoded.len());
}

#[test]
fn test_encode_decode_pairs_response() {
    let response = Response::ok(Reply::Pairs(vec![
        (b"a".to_vec(), b"1".to_vec()),
        (b"b".to_vec(), Vec::new()),
    ]));
    let encoded = encode_response(CommandKind::MGet, &response).unwrap();
    assert_eq!(
        &encoded[..],
        &[0, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 1, b'a', b'1', 0, 0, 0, 1, 0, 0, 0, 0, b'b']
    );
    let (decoded, _) = decode_response(CommandKind::MGet, &encoded).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn test_encode_decode_numeric_responses() {
    let cases = [
        (CommandKind::VSiz, Reply::U32(u32::MAX)),
        (CommandKind::AddInt, Reply::I32(i32::MIN)),
        (CommandKind::RNum, Reply::U64(0)),
        (CommandKind::AddDouble, Reply::double(3.5)),
    ];
    for (kind, reply) in cases {
        let response = Response::ok(reply);
        let encoded = encode_response(kind, &response).unwrap();
        let (decoded, _) = decode_response(kind, &encoded).unwrap();
        assert_eq!(decoded, response, "{}", kind);
    }
}

#[test]
fn test_failure_response_has_no_payload() {
    let encoded = encode_response(CommandKind::Get, &Response::failure(1)).unwrap();
    assert_eq!(&encoded[..], &[1]);

    let (decoded, _) = decode_response(CommandKind::Get, &encoded).unwrap();
    let err = decoded.into_result(CommandKind::Get).unwrap_err();
    assert!(err.is_no_record());
}

#[test]
fn test_reply_shape_must_match_command() {
    let response = Response::ok(Reply::U32(1));
    assert!(matches!(
        encode_response(CommandKind::Get, &response),
        Err(TyrantError::SchemaMismatch { .. })
    ));
}

#[test]
fn test_unknown_status_rejected() {
    assert!(matches!(
        decode_response(CommandKind::Put, &[0x0c]),
        Err(TyrantError::UnknownStatus(0x0c))
    ));
}

#[test]
fn test_truncated_response_is_malformed() {
    // Declares 10 items, carries one
    let bytes = [0, 0, 0, 0, 10, 0, 0, 0, 1, b'x'];
    assert!(matches!(
        decode_response(CommandKind::FwmKeys, &bytes),
        Err(TyrantError::MalformedResponse(_))
    ));
}

#[test]
fn test_status_resolution_per_command() {
    let cases = [
        (CommandKind::Get, 1, Some(ErrorCode::NoRecord)),
        (CommandKind::Out, 1, Some(ErrorCode::NoRecord)),
        (CommandKind::PutKeep, 1, Some(ErrorCode::ExistingRecord)),
        (CommandKind::Put, 1, Some(ErrorCode::InvalidOperation)),
        (CommandKind::Misc, 1, Some(ErrorCode::MiscError)),
        (CommandKind::Restore, 1, Some(ErrorCode::RestoreError)),
        (CommandKind::Put, 8, Some(ErrorCode::NoSpace)),
        (CommandKind::Get, 9, Some(ErrorCode::BrokenRecord)),
    ];
    for (kind, status, code) in cases {
        assert_eq!(status_error(kind, status).code(), code, "{} status {}", kind, status);
    }

    assert!(matches!(
        status_error(CommandKind::AddInt, 1),
        TyrantError::IncompatibleType
    ));
    assert!(matches!(
        status_error(CommandKind::Get, 0x42),
        TyrantError::UnknownStatus(0x42)
    ));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_write_read_command_stream() {
    let mut buf = Vec::new();
    write_command(&mut buf, &Request::put(b"k1", b"v1"), MAX_FIELD_SIZE).unwrap();
    write_command(&mut buf, &Request::get(b"k1"), MAX_FIELD_SIZE).unwrap();

    let mut cursor = Cursor::new(buf);

    let (kind, values) = read_command(&mut cursor, MAX_FIELD_SIZE).unwrap().unwrap();
    assert_eq!(kind, CommandKind::Put);
    assert_eq!(values[0].as_bytes(), Some(&b"k1"[..]));

    let (kind, values) = read_command(&mut cursor, MAX_FIELD_SIZE).unwrap().unwrap();
    assert_eq!(kind, CommandKind::Get);
    assert_eq!(values[0].as_bytes(), Some(&b"k1"[..]));

    assert!(read_command(&mut cursor, MAX_FIELD_SIZE).unwrap().is_none());
}

#[test]
fn test_write_read_response_stream() {
    let mut buf = Vec::new();
    write_response(&mut buf, CommandKind::Get, &Response::ok(Reply::Blob(b"v".to_vec()))).unwrap();
    write_response(&mut buf, CommandKind::Out, &Response::failure(1)).unwrap();

    let mut cursor = Cursor::new(buf);

    let response = read_response(&mut cursor, CommandKind::Get, MAX_FIELD_SIZE).unwrap();
    assert_eq!(response.reply, Reply::Blob(b"v".to_vec()));

    let response = read_response(&mut cursor, CommandKind::Out, MAX_FIELD_SIZE).unwrap();
    assert_eq!(response.status, 1);
}

#[test]
fn test_eof_mid_frame_is_connection_lost() {
    let mut cursor = Cursor::new(vec![0, 0, 0, 0, 9, b'p']);
    let err = read_response(&mut cursor, CommandKind::Get, MAX_FIELD_SIZE).unwrap_err();
    assert!(err.is_connection_lost());
    assert_eq!(err.code(), Some(ErrorCode::ReceiveError));
}

#[test]
fn test_declared_length_over_limit_on_stream() {
    let mut cursor = Cursor::new(vec![0, 0, 0, 1, 0]);
    assert!(matches!(
        read_response(&mut cursor, CommandKind::Stat, 16),
        Err(TyrantError::MalformedResponse(_))
    ));
}
