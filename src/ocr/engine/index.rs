use crate::ocr::error::LayerError;
use crate::ocr::model::{DocumentText, TextSegment, Token};

pub(crate) fn ensure_sorted<T>(
    items: &[T],
    what: &'static str,
    key: impl Fn(&T) -> usize,
) -> Result<(), LayerError> {
    let mut previous = 0usize;
    for (index, item) in items.iter().enumerate() {
        let current = key(item);
        if index > 0 && current < previous {
            return Err(LayerError::Unsorted {
                what,
                index,
                previous,
                current,
            });
        }
        previous = current;
    }
    Ok(())
}

/// Returns the tokens whose segments exactly tile `line`.
///
/// `tokens` must be sorted by segment start. Both ends of the line have to
/// coincide with a token boundary; anything else means the upstream offsets
/// are off and is reported instead of approximated.
pub(crate) fn tokens_in_line<'t>(
    text: &DocumentText,
    line: TextSegment,
    tokens: &'t [Token],
) -> Result<&'t [Token], LayerError> {
    let start = tokens.binary_search_by(|token| token.segment.start.cmp(&line.start));
    let end = tokens.binary_search_by(|token| token.segment.end.cmp(&line.end));
    match (start, end) {
        (Ok(first), Ok(last)) if first <= last => Ok(&tokens[first..=last]),
        _ => Err(alignment_error(text, line, tokens, start, end)),
    }
}

fn alignment_error(
    text: &DocumentText,
    line: TextSegment,
    tokens: &[Token],
    start: Result<usize, usize>,
    end: Result<usize, usize>,
) -> LayerError {
    let nearest = |found: Result<usize, usize>| {
        let idx = found.unwrap_or_else(|insert_at| insert_at);
        idx.min(tokens.len().saturating_sub(1))
    };
    let (first, last) = (nearest(start), nearest(end));
    let describe = |idx: usize| {
        tokens
            .get(idx)
            .map(|token| token.segment.label())
            .unwrap_or_else(|| "none".to_string())
    };
    let token_texts = tokens
        .get(first.min(last)..=first.max(last))
        .unwrap_or_default()
        .iter()
        .map(|token| text.slice(token.segment).to_string())
        .collect();
    LayerError::Alignment {
        line: line.label(),
        first: describe(first),
        last: describe(last),
        line_text: text.slice(line).to_string(),
        token_texts,
    }
}
