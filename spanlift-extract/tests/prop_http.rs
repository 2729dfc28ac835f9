use proptest::prelude::*;
use spanlift_extract::http;

// ---------------------------------------------------------------------------
// Property: parse_request never panics on arbitrary bytes
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn parse_request_never_panics(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        if let Some(req) = http::parse_request(&data) {
            let _ = req.exchange();
            let _ = req.is_truncated();
        }
    }
}

// ---------------------------------------------------------------------------
// Property: request line fields survive the round trip through the parser
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn request_fields_extracted(
        method in prop_oneof![Just("GET"), Just("POST"), Just("PUT"), Just("DELETE")],
        path in "(/[a-z0-9_,-]{1,12}){1,4}",
        query in proptest::option::of("[a-z]{1,6}=[a-z0-9]{1,6}"),
        body in "[ -~]{0,64}",
    ) {
        let target = match &query {
            Some(q) => format!("{path}?{q}"),
            None => path.clone(),
        };
        let raw = format!(
            "{method} {target} HTTP/1.1\r\nHost: es:9200\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let req = http::parse_request(raw.as_bytes()).unwrap();
        prop_assert!(!req.is_truncated());

        let ex = req.exchange();
        prop_assert_eq!(ex.method, method);
        prop_assert_eq!(ex.path, path.as_str());
        prop_assert_eq!(ex.query, query.as_deref().unwrap_or(""));
        prop_assert_eq!(ex.body, body.as_bytes());
    }
}

// ---------------------------------------------------------------------------
// Property: a capture cut anywhere inside the body is flagged as truncated
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn short_body_is_truncated(
        body in "[a-z]{2,64}",
        cut in any::<proptest::sample::Index>(),
    ) {
        let head = format!("POST /idx/_search HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len());
        let keep = cut.index(body.len());
        let raw = format!("{head}{}", &body[..keep]);
        let req = http::parse_request(raw.as_bytes()).unwrap();
        prop_assert!(req.is_truncated());
        prop_assert_eq!(req.exchange().body.len(), keep);
    }
}

// ---------------------------------------------------------------------------
// Property: a chunked body reassembles to the original bytes, wherever the
// chunk boundaries fall and wherever the capture stops
// ---------------------------------------------------------------------------

fn chunked(body: &[u8], sizes: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rest = body;
    let mut sizes = sizes.iter().cycle();
    while !rest.is_empty() {
        let n = (*sizes.next().unwrap_or(&1)).clamp(1, rest.len());
        let (chunk, tail) = rest.split_at(n);
        out.extend_from_slice(format!("{n:x}\r\n").as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
        rest = tail;
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn chunked_body_reassembles(
        body in proptest::collection::vec(any::<u8>(), 1..512),
        sizes in proptest::collection::vec(1usize..64, 1..8),
    ) {
        let mut raw = b"POST /idx/_search HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        raw.extend_from_slice(&chunked(&body, &sizes));
        let req = http::parse_request(&raw).unwrap();
        prop_assert!(req.chunked);
        prop_assert!(!req.is_truncated());
        prop_assert_eq!(req.exchange().body, &body[..]);
    }

    #[test]
    fn cut_chunked_body_is_a_prefix(
        body in proptest::collection::vec(any::<u8>(), 1..256),
        sizes in proptest::collection::vec(1usize..32, 1..6),
        cut in any::<proptest::sample::Index>(),
    ) {
        let head = b"POST /idx/_search HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        let encoded = chunked(&body, &sizes);
        // Stop anywhere before the final "0\r\n\r\n".
        let keep = cut.index(encoded.len() - 5);
        let mut raw = head.to_vec();
        raw.extend_from_slice(&encoded[..keep]);

        let req = http::parse_request(&raw).unwrap();
        prop_assert!(req.is_truncated());
        let ex = req.exchange();
        prop_assert!(body.starts_with(ex.body));
    }
}
