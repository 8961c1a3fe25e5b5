use super::*;

fn node(name: &str, value: &str) -> TransferNode {
    let segments = parse_structured_name(name).expect("structured name");
    TransferNode::from_segments(&segments, vec![value.to_string()]).expect("node")
}

#[test]
fn parses_item_index_and_child_segments() {
    let segments = parse_structured_name("grid_0002.row.edit_7").expect("valid name");
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].id, "grid");
    assert_eq!(segments[0].index, Some(2));
    assert_eq!(segments[1].index, None);
    assert_eq!(segments[2].id, "edit");
    assert_eq!(segments[2].index, Some(7));
}

#[test]
fn rejects_names_outside_convention() {
    assert!(parse_structured_name("").is_none());
    assert!(parse_structured_name("9lives").is_none());
    assert!(parse_structured_name("first_name").is_none());
    assert!(parse_structured_name("a..b").is_none());
    assert!(parse_structured_name("x-y").is_none());
}

#[test]
fn item_indices_beyond_the_row_limit_do_not_parse() {
    let limit = format!("name_{MAX_ITEM_INDEX}");
    let segments = parse_structured_name(&limit).expect("limit parses");
    assert_eq!(segments[0].index, Some(MAX_ITEM_INDEX));

    assert!(parse_structured_name(&format!("name_{}", MAX_ITEM_INDEX + 1)).is_none());
    assert!(parse_structured_name("name_4000000000").is_none());
    assert!(parse_structured_name("name_18446744073709551615").is_none());
    assert!(parse_structured_name("grid_0001.row_99999999999999999999999").is_none());
}

#[test]
fn child_chain_follows_path_segments() {
    let head = node("grid_0002.row.edit", "go");
    let links: Vec<&str> = head.child_chain().map(TransferNode::id).collect();
    assert_eq!(links, vec!["row", "edit"]);
    assert!(head.child_chain().all(|link| link.values().is_empty()));
    assert_eq!(head.value(), Some("go"));
}

#[test]
fn repeated_identifier_merges_into_sibling_chain() {
    let mut tree = TransferTree::new();
    tree.insert(node("name_0001", "Ada"));
    tree.insert(node("name_0002", "Bob"));
    tree.insert(node("name_0003", "Cy"));

    assert_eq!(tree.len(), 1);
    let head = tree.get("name").expect("name entry");
    assert_eq!(head.chain_len(), 3);
    let order: Vec<Option<usize>> = head.chain().map(TransferNode::item_index).collect();
    assert_eq!(order, vec![Some(1), Some(3), Some(2)]);
}

#[test]
fn two_occurrences_keep_arrival_order() {
    let mut tree = TransferTree::new();
    tree.insert(node("name_0001", "Ada"));
    tree.insert(node("name_0002", "Bob"));

    let values: Vec<&str> = tree
        .get("name")
        .expect("name entry")
        .chain()
        .filter_map(TransferNode::value)
        .collect();
    assert_eq!(values, vec!["Ada", "Bob"]);
}

#[test]
fn binding_supplies_long_name_and_property() {
    let plain = TransferNode::new("total", None, vec!["3".into()]);
    assert_eq!(plain.long_name(), "total");
    assert_eq!(plain.property(), "total");

    let bound = plain.with_binding(PropertyBinding::new("acct.form.total", "totalAmount"));
    assert_eq!(bound.long_name(), "acct.form.total");
    assert_eq!(bound.property(), "totalAmount");
}

#[test]
fn blank_action_id_is_ignored() {
    let mut tree = TransferTree::new();
    tree.set_action_id("  ");
    assert_eq!(tree.action_id(), None);
    tree.set_action_id("/acct/savePage");
    assert_eq!(tree.action_id(), Some("/acct/savePage"));
}
