//! 使用公开的 GPT-2/GPT-3 词表与合词规则的集成测试。

#![cfg(feature = "embedded")]

use std::sync::LazyLock;
use tokeneer_gpt::{utok, Directory, Embedded, Encoder, Error, ErrorKind, Scheme};

static ENCODER: LazyLock<Encoder> = LazyLock::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
    Encoder::from_resources(Scheme::Gpt3, &Embedded).unwrap()
});

const END_OF_TEXT: utok = 50256;

#[test]
fn known_ids() {
    let cases: &[(&str, &[utok])] = &[
        ("This is some text.", &[1212, 318, 617, 2420, 13]),
        ("Lorem", &[43, 29625]),
        ("Hello, world!", &[15496, 11, 995, 0]),
        ("hello hello hello", &[31373, 23748, 23748]),
        (
            "I'm sure they'll say it's fine",
            &[40, 1101, 1654, 484, 1183, 910, 340, 338, 3734],
        ),
        (
            "The quick brown fox jumps over the lazy dog.",
            &[464, 2068, 7586, 21831, 18045, 625, 262, 16931, 3290, 13],
        ),
        ("1234567890", &[10163, 2231, 30924, 3829]),
        ("  indented\n\ttab", &[220, 773, 4714, 198, 197, 8658]),
        (
            "你好，世界 🦀",
            &[19526, 254, 25001, 121, 171, 120, 234, 10310, 244, 45911, 234, 12520, 99, 222],
        ),
        ("<|endoftext|>", &[27, 91, 437, 1659, 5239, 91, 29]),
    ];
    for &(text, ids) in cases {
        assert_eq!(ENCODER.encode(text).unwrap(), ids, "encode {text:?}");
        assert_eq!(ENCODER.decode(ids).unwrap(), text, "decode {ids:?}");
        assert_eq!(ENCODER.count(text).unwrap(), ids.len());
    }
}

#[test]
fn vocab_size() {
    assert_eq!(ENCODER.vocab_size(), 50257);
    assert_eq!(ENCODER.internal().vocab().merge_count(), 50000);
}

#[test]
fn empty() {
    assert!(ENCODER.encode("").unwrap().is_empty());
    assert_eq!(ENCODER.decode(&[]).unwrap(), "");
    assert_eq!(ENCODER.count("").unwrap(), 0);
}

#[test]
fn invalid_token() {
    let e = ENCODER.decode(&[43, 150000]).unwrap_err();
    assert!(matches!(e, Error::InvalidToken(150000)), "{e}");
    assert_eq!(e.kind(), ErrorKind::Decoding);
    assert!(matches!(
        ENCODER.decode(&[50257]),
        Err(Error::InvalidToken(50257))
    ));
}

#[test]
fn truncated_codepoint() {
    // "你" 的三个字节被分成两个词
    let tokens = ENCODER.encode("你").unwrap();
    assert_eq!(tokens, [19526, 254]);
    let e = ENCODER.decode(&tokens[..1]).unwrap_err();
    assert!(matches!(e, Error::InvalidUtf8(_)), "{e}");
    let mut bytes = ENCODER.decode_bytes(&tokens[..1]).unwrap();
    bytes.extend(ENCODER.decode_bytes(&tokens[1..]).unwrap());
    assert_eq!(String::from_utf8(bytes).unwrap(), "你");
}

#[test]
fn roundtrip() {
    for text in [
        "Rust is a systems programming language.",
        "Multi-line\ntext\r\nwith\n\n\nnewlines\n",
        "Special characters: !@#$%^&*()_+-=[]{}|;':\",./<>?`~",
        "Unicode: こんにちは 世界 🦀 Ελληνικά русский العربية",
        "   leading, trailing and   inner   spaces   ",
        "\u{0}\u{1}\u{7f} control bytes \u{ad}\u{a0}",
        "we'll they've I'd you're IT'S",
        "1,234.56 + 7e10 = ?",
    ] {
        let tokens = ENCODER.encode(text).unwrap();
        assert_eq!(ENCODER.decode(&tokens).unwrap(), text, "{tokens:?}");
    }
}

#[test]
fn every_byte() {
    // 每个字节单独成词时都能还原
    for b in 0..=127u8 {
        let text = (b as char).to_string();
        let tokens = ENCODER.encode(&text).unwrap();
        assert_eq!(tokens.len(), 1, "{b}");
        assert_eq!(ENCODER.decode(&tokens).unwrap(), text);
    }
    // 非 ASCII 字节单独出现时不是合法的 UTF-8，只能按字节解码
    for b in 128..=255u8 {
        let symbol = tokeneer_gpt::byte_map::encode(b).to_string();
        let id = ENCODER.internal().vocab().id(&symbol).unwrap();
        assert_eq!(ENCODER.decode_bytes(&[id]).unwrap(), [b]);
    }
}

#[test]
fn repeated_substrings() {
    let word = ENCODER.encode(" tokenizer").unwrap();
    let text = " tokenizer".repeat(5);
    let tokens = ENCODER.encode(&text).unwrap();
    assert_eq!(tokens.len(), word.len() * 5);
    for chunk in tokens.chunks(word.len()) {
        assert_eq!(chunk, word);
    }
}

#[test]
fn cache_is_transparent() {
    let fresh = Encoder::from_resources(Scheme::Gpt3, &Embedded).unwrap();
    let text = "Caching never changes the result. Caching never changes the result.";
    assert_eq!(fresh.cache_len(), 0);
    let cold = fresh.encode(text).unwrap();
    assert!(fresh.cache_len() > 0);
    let warm = fresh.encode(text).unwrap();
    assert_eq!(cold, warm);
    fresh.clear_cache();
    assert_eq!(fresh.cache_len(), 0);
    assert_eq!(fresh.encode(text).unwrap(), cold);
    assert_eq!(ENCODER.encode(text).unwrap(), cold);
}

#[test]
fn special_tokens() {
    let text = "first<|endoftext|>second";
    let plain = ENCODER.encode(text).unwrap();
    assert!(!plain.contains(&END_OF_TEXT));

    let special = ENCODER.encode_with_special(text).unwrap();
    let first = ENCODER.encode("first").unwrap();
    let second = ENCODER.encode("second").unwrap();
    assert_eq!(special, [&first[..], &[END_OF_TEXT][..], &second[..]].concat());
    assert_eq!(ENCODER.decode(&special).unwrap(), text);

    assert_eq!(
        ENCODER.special().collect::<Vec<_>>(),
        [("<|endoftext|>", &[END_OF_TEXT][..])]
    );
}

#[test]
fn concurrent_encode() {
    let text = "Threads share one encoder and one cache. ".repeat(20);
    let expected = ENCODER.encode(&text).unwrap();
    std::thread::scope(|s| {
        let handles = (0..8)
            .map(|_| s.spawn(|| ENCODER.encode(&text).unwrap()))
            .collect::<Vec<_>>();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}

#[test]
fn from_scheme_name() {
    if std::env::var_os(tokeneer_gpt::RESOURCE_DIR_ENV).is_some() {
        return;
    }
    let encoder = Encoder::from_scheme("gpt3").unwrap();
    assert_eq!(encoder.encode("Lorem").unwrap(), [43, 29625]);

    let e = Encoder::from_scheme("cl100k_base").err().unwrap();
    assert!(matches!(e, Error::UnknownScheme(_)), "{e}");
}

#[test]
fn from_directory() {
    let dir = Directory::new(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/gpt3"));
    let encoder = Encoder::from_resources(Scheme::Gpt3, &dir).unwrap();
    let text = "first<|endoftext|>second";
    assert_eq!(
        encoder.encode_with_special(text).unwrap(),
        [11085, END_OF_TEXT, 12227]
    );
    assert_eq!(encoder.encode(text).unwrap(), ENCODER.encode(text).unwrap());

    let missing = Directory::new(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/missing"));
    let e = Encoder::from_resources(Scheme::Gpt3, &missing).err().unwrap();
    assert!(matches!(e, Error::MissingResource { .. }), "{e}");
    assert_eq!(e.kind(), ErrorKind::Resource);
}

#[test]
fn long_newline_run() {
    let text = "\n".repeat(1_000_000) + "a";
    let tokens = ENCODER.encode(&text).unwrap();
    assert_eq!(tokens.len(), 500_002);
    assert!(tokens[..499_999].iter().all(|&t| t == 628));
    assert_eq!(tokens[499_998..], [628, 198, 198, 64]);
    assert_eq!(ENCODER.decode(&tokens).unwrap(), text);
}
