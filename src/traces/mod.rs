// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod decoder;
pub mod dictionary;
pub mod error;
pub mod span;
pub mod trace_agent;
