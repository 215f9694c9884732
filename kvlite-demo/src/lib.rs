// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

pub mod config;
pub mod error;
pub mod session;
pub mod users;
