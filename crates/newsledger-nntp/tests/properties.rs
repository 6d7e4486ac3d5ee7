//! Property tests for the NNTP grammar.

#![allow(clippy::unwrap_used, clippy::needless_collect)]

use newsledger_nntp::{ArticleRange, Error, FramedReader, Wildmat, parse_response};
use proptest::prelude::*;

fn encode(lines: &[String]) -> Vec<u8> {
    let mut writer = newsledger_nntp::FramedWriter::new(Vec::new());
    {
        let mut dot = writer.dot_writer();
        for line in lines {
            dot.write_line(line);
        }
        dot.finish();
    }
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    rt.block_on(writer.flush()).unwrap();
    writer.into_inner()
}

proptest! {
    #[test]
    fn response_codes_in_range_parse(code in 100u16..=599, text in "[ -~]{0,40}") {
        let line = if text.is_empty() {
            format!("{code}")
        } else {
            format!("{code} {text}")
        };
        let r = parse_response(line.as_bytes()).unwrap();
        prop_assert_eq!(r.code.as_u16(), code);
        prop_assert_eq!(r.text, text);
    }

    #[test]
    fn response_codes_out_of_range_fail(code in prop_oneof![0u16..100, 600u16..1000]) {
        let line = format!("{code:03} text");
        prop_assert!(matches!(parse_response(line.as_bytes()), Err(Error::CodeOutOfRange(_))));
    }

    #[test]
    fn digit_prefix_needs_space_or_end(code in 100u16..=599, c in "[!-~]") {
        let line = format!("{code}{c}");
        prop_assert!(matches!(parse_response(line.as_bytes()), Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn dot_stuffing_is_its_own_inverse(
        lines in proptest::collection::vec("[.]{0,2}[ -~]{0,20}", 0..12)
    ) {
        let wire = encode(&lines);
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let decoded = rt.block_on(async {
            let mut reader = FramedReader::new(wire.as_slice(), 1024);
            let mut dot = reader.dot_reader();
            let mut out = Vec::new();
            while let Some(line) = dot.next_line().await.unwrap() {
                out.push(String::from_utf8(line).unwrap());
            }
            out
        });
        prop_assert_eq!(decoded, lines);
    }

    #[test]
    fn star_matches_all(candidate in "\\PC*") {
        prop_assert!(Wildmat::any().matches(&candidate));
    }

    #[test]
    fn negation_excludes_exact_name(name in "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}") {
        let w = Wildmat::compile(&format!("*,!{name}")).unwrap();
        prop_assert!(!w.matches(&name));
        let extended = format!("{name}x");
        prop_assert!(w.matches(&extended));
    }

    #[test]
    fn range_display_parses_back(low in 1u64..1_000_000, len in proptest::option::of(0u64..1000)) {
        let r = ArticleRange::new(low, len.map(|l| low + l));
        prop_assert_eq!(ArticleRange::parse(&r.to_string()).unwrap(), r);
    }
}
