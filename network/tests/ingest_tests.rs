// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use futures::{stream, StreamExt};
use model::RegionSizes;
use network::{
    ingest_request, FrameError, IngestDecoder, IngestError, IngestLimits, IngestedRequest,
    RequestHeader, StreamFrame,
};
use tier_types::ErrorCode;

fn limits() -> IngestLimits {
    IngestLimits {
        max_chunk_bytes: 16,
        max_payload_bytes: 1024,
    }
}

fn frames(
    items: Vec<StreamFrame>,
) -> impl futures::Stream<Item = Result<StreamFrame, FrameError>> + Unpin {
    stream::iter(items.into_iter().map(Ok))
}

fn install_header(sizes: (u64, u64, u64)) -> StreamFrame {
    StreamFrame::Header(RequestHeader::Install {
        tag: 7,
        sizes: RegionSizes::new(sizes.0, sizes.1, sizes.2),
    })
}

#[test]
fn test_decoder_accepts_exact_payload() {
    let mut decoder = IngestDecoder::new(20, &limits()).expect("decoder");
    decoder.push(&[1u8; 16]).expect("chunk");
    decoder.push(&[2u8; 4]).expect("chunk");
    assert_eq!(decoder.received(), 20);
    let blob = decoder.finish().expect("blob");
    assert_eq!(blob.len(), 20);
    assert_eq!(blob[19], 2);
}

#[test]
fn test_decoder_rejects_one_byte_too_many() {
    let mut decoder = IngestDecoder::new(10, &limits()).expect("decoder");
    decoder.push(&[0u8; 10]).expect("chunk");
    let err = decoder.push(&[0u8; 1]).unwrap_err();
    assert_eq!(err, IngestError::PayloadOverflow { declared: 10 });
    assert_eq!(err.code(), ErrorCode::PayloadOverflow);
}

#[test]
fn test_decoder_rejects_one_byte_too_few() {
    let mut decoder = IngestDecoder::new(10, &limits()).expect("decoder");
    decoder.push(&[0u8; 9]).expect("chunk");
    let err = decoder.finish().unwrap_err();
    assert_eq!(err.code(), ErrorCode::PayloadTruncated);
}

#[test]
fn test_decoder_enforces_limits() {
    let err = IngestDecoder::new(4096, &limits()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PayloadOverflow);

    let mut decoder = IngestDecoder::new(100, &limits()).expect("decoder");
    let err = decoder.push(&[0u8; 17]).unwrap_err();
    assert_eq!(err, IngestError::ChunkTooLarge { len: 17, limit: 16 });
    assert_eq!(err.code(), ErrorCode::MalformedRequest);
}

#[test]
fn test_decoder_does_not_reserve_the_declared_total_up_front() {
    let limits = IngestLimits {
        max_chunk_bytes: 16,
        max_payload_bytes: 1 << 40,
    };
    let mut decoder = IngestDecoder::new(1 << 40, &limits).expect("decoder");
    decoder.push(&[1u8; 16]).expect("chunk");
    assert_eq!(decoder.received(), 16);
    assert_eq!(decoder.declared(), 1 << 40);
    let err = decoder.finish().unwrap_err();
    assert_eq!(err.code(), ErrorCode::PayloadTruncated);
}

#[test]
fn test_empty_payload_is_complete_immediately() {
    let decoder = IngestDecoder::new(0, &limits()).expect("decoder");
    assert!(decoder.finish().expect("blob").is_empty());
}

#[tokio::test]
async fn test_install_is_reassembled_from_chunks() {
    let mut input = frames(vec![
        install_header((10, 20, 30)),
        StreamFrame::Chunk(vec![1u8; 16]),
        StreamFrame::Chunk(vec![2u8; 16]),
        StreamFrame::Chunk(vec![3u8; 16]),
        StreamFrame::Chunk(vec![4u8; 12]),
        StreamFrame::Finish,
    ]);
    let request = ingest_request(&mut input, &limits()).await.expect("request");
    match request {
        IngestedRequest::Install { tag, sizes, bytes } => {
            assert_eq!(tag, 7);
            assert_eq!(sizes.total(), Some(60));
            assert_eq!(bytes.len(), 60);
            assert_eq!(bytes[59], 4);
        }
        other => panic!("unexpected request {other:?}"),
    }
}

#[tokio::test]
async fn test_install_overflow_and_truncation() {
    let mut overflow = frames(vec![
        install_header((2, 2, 2)),
        StreamFrame::Chunk(vec![0u8; 7]),
        StreamFrame::Finish,
    ]);
    let err = ingest_request(&mut overflow, &limits()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PayloadOverflow);

    // connection closing without Finish ends the stream
    let mut truncated = frames(vec![install_header((2, 2, 2)), StreamFrame::Chunk(vec![0u8; 5])]);
    let err = ingest_request(&mut truncated, &limits()).await.unwrap_err();
    assert_eq!(
        err,
        IngestError::PayloadTruncated {
            declared: 6,
            received: 5
        }
    );
}

#[tokio::test]
async fn test_stream_must_start_with_metadata() {
    let mut chunk_first = frames(vec![StreamFrame::Chunk(vec![1, 2, 3]), StreamFrame::Finish]);
    let err = ingest_request(&mut chunk_first, &limits()).await.unwrap_err();
    assert_eq!(err, IngestError::MissingMetadata);
    assert_eq!(err.code(), ErrorCode::MalformedRequest);

    let mut empty = frames(Vec::new());
    assert_eq!(
        ingest_request(&mut empty, &limits()).await.unwrap_err(),
        IngestError::MissingMetadata
    );

    let mut repeated = frames(vec![
        install_header((1, 1, 1)),
        install_header((1, 1, 1)),
    ]);
    assert_eq!(
        ingest_request(&mut repeated, &limits()).await.unwrap_err(),
        IngestError::UnexpectedHeader
    );
}

#[tokio::test]
async fn test_classify_tag_count_is_checked() {
    let photo = |tags: Vec<u32>| {
        frames(vec![
            StreamFrame::Header(RequestHeader::Classify {
                tags,
                photo_size: 4,
            }),
            StreamFrame::Chunk(vec![9u8; 4]),
            StreamFrame::Finish,
        ])
    };

    let request = ingest_request(&mut photo(vec![3]), &limits())
        .await
        .expect("request");
    assert!(matches!(request, IngestedRequest::Classify(ref p) if p.tag == 3 && p.bytes.len() == 4));

    let err = ingest_request(&mut photo(vec![1, 2]), &limits())
        .await
        .unwrap_err();
    assert_eq!(err, IngestError::UnsupportedMultiTag(2));

    let err = ingest_request(&mut photo(Vec::new()), &limits())
        .await
        .unwrap_err();
    assert_eq!(err, IngestError::NoTags);
}

#[tokio::test]
async fn test_multi_tag_is_answered_before_the_photo_is_read() {
    // declared photo is far over the payload limit
    let mut oversized = frames(vec![
        StreamFrame::Header(RequestHeader::Classify {
            tags: vec![1, 2],
            photo_size: 4096,
        }),
        StreamFrame::Chunk(vec![0u8; 16]),
        StreamFrame::Finish,
    ]);
    let err = ingest_request(&mut oversized, &limits()).await.unwrap_err();
    assert_eq!(err, IngestError::UnsupportedMultiTag(2));
    assert!(matches!(oversized.next().await, Some(Ok(StreamFrame::Chunk(_)))));

    // stream cut short after three of eight bytes
    let mut truncated = frames(vec![
        StreamFrame::Header(RequestHeader::Classify {
            tags: vec![1, 2],
            photo_size: 8,
        }),
        StreamFrame::Chunk(vec![0u8; 3]),
    ]);
    let err = ingest_request(&mut truncated, &limits()).await.unwrap_err();
    assert_eq!(err, IngestError::UnsupportedMultiTag(2));

    let mut empty = frames(vec![StreamFrame::Header(RequestHeader::Classify {
        tags: Vec::new(),
        photo_size: 4096,
    })]);
    let err = ingest_request(&mut empty, &limits()).await.unwrap_err();
    assert_eq!(err, IngestError::NoTags);
}

#[tokio::test]
async fn test_remove_needs_no_payload() {
    let mut input = frames(vec![StreamFrame::Header(RequestHeader::Remove { tag: 11 })]);
    let request = ingest_request(&mut input, &limits()).await.expect("request");
    assert_eq!(request.tag(), 11);
    assert!(matches!(request, IngestedRequest::Remove { tag: 11 }));
}

#[tokio::test]
async fn test_declared_size_overflow_is_malformed() {
    let mut input = frames(vec![install_header((u64::MAX, 1, 0))]);
    let err = ingest_request(&mut input, &limits()).await.unwrap_err();
    assert_eq!(err, IngestError::InvalidSizes);
}
