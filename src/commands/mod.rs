// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod audit;
pub mod carry_forward;
pub mod convenience;
pub mod dashboard;
pub mod doctor;
pub mod employees;
pub mod exporter;
pub mod importer;
pub mod insurance;
pub mod leave;
pub mod ledger;
pub mod payroll;
pub mod policies;
pub mod users;
