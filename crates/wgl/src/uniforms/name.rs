/// Components of a reflected uniform name such as `lights[2].intensity`.
///
/// Absent indices are `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    pub struct_name: Option<String>,
    pub struct_index: i32,
    pub property_name: String,
    pub property_index: i32,
}

impl NameParts {
    pub fn parse(name: &str) -> Self {
        let (struct_part, property_part) = match name.rsplit_once('.') {
            Some((head, tail)) => (Some(head), tail),
            None => (None, name),
        };
        let (property_name, property_index) = split_index(property_part);
        let (struct_name, struct_index) = match struct_part {
            Some(part) => {
                let (name, index) = split_index(part);
                (Some(name.to_string()), index)
            }
            None => (None, -1),
        };
        Self {
            struct_name,
            struct_index,
            property_name: property_name.to_string(),
            property_index,
        }
    }
}

fn split_index(segment: &str) -> (&str, i32) {
    let Some(inner) = segment.strip_suffix(']') else {
        return (segment, -1);
    };
    match inner.rsplit_once('[') {
        Some((name, index)) => (name, index.trim().parse().unwrap_or(-1)),
        None => (segment, -1),
    }
}
