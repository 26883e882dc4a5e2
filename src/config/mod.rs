// ABOUTME: Configuration module organization for the relay service
// ABOUTME: Houses environment-variable driven server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

/// Environment-based configuration management
pub mod environment;
