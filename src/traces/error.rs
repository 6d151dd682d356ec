// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::traces::decoder::Codec;
use crate::traces::dictionary::DictionaryError;

/// Failure of a single codec against a request body.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Msgpack(#[from] rmp_serde::decode::Error),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    /// The declared content type selected one codec and it failed.
    #[error("could not decode {codec} payload: {source}")]
    Decode {
        codec: Codec,
        #[source]
        source: CodecError,
    },
    /// The content type was not conclusive and every codec failed.
    #[error(
        "could not decode {body_len}-byte payload as JSON ({json}), nor Msgpack ({msgpack}), nor v0.5 ({dictionary})"
    )]
    Exhausted {
        body_len: usize,
        json: CodecError,
        msgpack: CodecError,
        dictionary: CodecError,
    },
}

impl DecodeError {
    /// The codec whose failure is reported, `None` when all of them failed.
    #[must_use]
    pub fn codec(&self) -> Option<Codec> {
        match self {
            DecodeError::Decode { codec, .. } => Some(*codec),
            DecodeError::Exhausted { .. } => None,
        }
    }
}
