//! Unit tests for the klines response parser

use candle_loader::fetcher::PAGE_LIMIT;
use candle_loader::parser::{parse_candles, CandlePage, ParseError};
use serde_json::json;

fn kline(open_time_ms: u64) -> serde_json::Value {
    json!([
        open_time_ms,         // 0: Open time
        "2507.22000000",      // 1: Open price
        "2507.23000000",      // 2: High price
        "2507.21000000",      // 3: Low price
        "2507.23000000",      // 4: Close price
        "1.11450000",         // 5: Volume
        open_time_ms + 999,   // 6: Close time
        "2794.29964300",      // 7: Quote volume
        29,                   // 8: Number of trades
        "0.84730000",         // 9: Taker buy base volume
        "2124.37313100",      // 10: Taker buy quote volume
        "0"                   // 11: Ignore
    ])
}

#[test]
fn test_full_page_fills_buffer() {
    let rows: Vec<_> = (0..PAGE_LIMIT as u64)
        .map(|i| kline(1707696000000 + i * 1000))
        .collect();
    let body = serde_json::to_vec(&rows).unwrap();

    let mut page = CandlePage::new();
    let count = parse_candles(&body, &mut page).unwrap();

    assert_eq!(count, PAGE_LIMIT);
    assert!(page.is_full());
    assert_eq!(page.as_slice()[0].close_time, 1707696001);
    assert_eq!(page.last().unwrap().close_time, 1707696000 + PAGE_LIMIT as u32);
}

#[test]
fn test_close_times_line_up_with_next_open() {
    let rows = vec![kline(1707696997000), kline(1707696998000)];
    let body = serde_json::to_vec(&rows).unwrap();

    let mut page = CandlePage::new();
    parse_candles(&body, &mut page).unwrap();

    let candles = page.as_slice();
    assert_eq!(candles[0].close_time, 1707696998);
    assert_eq!(candles[1].close_time, 1707696999);
    assert_eq!(candles[0].close, 2507.23f32);
    assert_eq!(candles[0].volume, 1.1145f32);
}

#[test]
fn test_row_that_is_not_an_array() {
    let body = serde_json::to_vec(&json!([kline(0), {"open": 1}])).unwrap();
    let mut page = CandlePage::new();

    let err = parse_candles(&body, &mut page).unwrap_err();
    assert!(matches!(err, ParseError::RowNotArray { row: 1 }));
    assert!(page.is_empty());
}

#[test]
fn test_error_messages_name_the_field() {
    let body = br#"[[0,"1","2","oops","4","5",1999]]"#;
    let mut page = CandlePage::new();

    let err = parse_candles(body, &mut page).unwrap_err();
    assert!(err.to_string().starts_with("parse low price: row 0: "));
}
