//! Outline rendering of a tree dump.
//!
//! ```text
//! ConfigX
//! ├── app
//! │   ├── name : str = "demo"
//! │   └── ui : {}
//! └── debug : bool = false
//! ```

use configx_core::{Mapping, TreeValue};

const ROOT_LABEL: &str = "ConfigX";

/// Render `tree` as a box-drawing outline. Leaves show their type, and
/// their value when `show_values` is set. Empty branches show `{}`.
pub fn render_tree(tree: &Mapping, show_values: bool) -> String {
    let mut lines = vec![ROOT_LABEL.to_string()];
    render_children(tree, "", show_values, &mut lines);
    lines.join("\n")
}

fn render_children(map: &Mapping, prefix: &str, show_values: bool, lines: &mut Vec<String>) {
    let count = map.len();
    for (i, (name, value)) in map.iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        match value {
            TreeValue::Leaf(scalar) => {
                let mut line = format!("{}{}{} : {}", prefix, connector, name, scalar.type_name());
                if show_values {
                    line.push_str(&format!(" = {}", scalar));
                }
                lines.push(line);
            }
            TreeValue::Branch(children) if children.is_empty() => {
                lines.push(format!("{}{}{} : {{}}", prefix, connector, name));
            }
            TreeValue::Branch(children) => {
                lines.push(format!("{}{}{}", prefix, connector, name));
                let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
                render_children(children, &child_prefix, show_values, lines);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
