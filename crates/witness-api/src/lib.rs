// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP surface over the witness query services.
//!
//! Every query response carries a `degraded` flag so clients can tell "no" from "could not
//! confirm".

pub mod handler;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod state;

pub use handler::{create_app, ApiError};
pub use state::AppState;
