// Copyright 2025 JiangLong.
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

//! Extraction of field ownership conflicts from apply failure messages.
//!
//! The server reports conflicts as text, either on a single line
//!
//! ```text
//! Apply failed with 1 conflict: conflict with "kubectl" using apps/v1: .spec.replicas
//! ```
//!
//! or grouped per manager with one field per line
//!
//! ```text
//! Apply failed with 2 conflicts: conflicts with "helm" using v1:
//! - .data.a
//! - .data.b
//! ```

use crate::shared::error::FieldConflict;
use regex::Regex;
use std::sync::OnceLock;

fn manager_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"conflicts? with "([^"]+)"[^:]*:(.*)$"#).expect("conflict pattern is valid")
    })
}

pub fn parse_conflict_message(message: &str) -> Vec<FieldConflict> {
    let mut conflicts = Vec::new();
    let mut current_manager: Option<String> = None;

    for line in message.lines() {
        let line = line.trim();
        if let Some(captures) = manager_pattern().captures(line) {
            let manager = captures[1].to_string();
            let inline_field = captures[2].trim();
            if !inline_field.is_empty() {
                conflicts.push(FieldConflict {
                    manager: manager.clone(),
                    field: inline_field.to_string(),
                });
            }
            current_manager = Some(manager);
        } else if let (Some(field), Some(manager)) =
            (line.strip_prefix("- "), current_manager.as_ref())
        {
            conflicts.push(FieldConflict {
                manager: manager.clone(),
                field: field.trim().to_string(),
            });
        }
    }

    conflicts
}
