// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ready-made node sets built on the data-flow model.

pub mod calculator;
