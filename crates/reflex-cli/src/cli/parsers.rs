use reflex_core::GraphFormat;

pub(super) fn parse_graph_format(raw: &str) -> std::result::Result<GraphFormat, String> {
    raw.parse::<GraphFormat>()
}

pub(super) fn parse_min_one_usize(raw: &str) -> std::result::Result<usize, String> {
    let value = raw
        .parse::<usize>()
        .map_err(|_| format!("invalid integer value '{raw}'"))?;
    if value == 0 {
        return Err("value must be >= 1".to_string());
    }
    Ok(value)
}
