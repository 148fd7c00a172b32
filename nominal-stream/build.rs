// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

fn main() -> std::io::Result<()> {
    prost_build::compile_protos(&["proto/nominal_write.proto"], &["proto/"])
}
