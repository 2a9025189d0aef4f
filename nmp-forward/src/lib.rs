// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ingest side of the check bridge: decodes forward-protocol frames arriving
//! over TCP into record sets, and echoes UDP heartbeat datagrams.

pub mod decode;
pub mod heartbeat;
pub mod input;

pub use decode::{decode_frame, DecodeError};
pub use heartbeat::HeartbeatInput;
pub use input::ForwardInput;
