//! Run-length notation for rank and call-ID lists.
//!
//! A list such as `[0, 1, 2, 3, 4, 5, 6, 8, 9, 10, 42]` is written
//! `0-6,8-10,42`: consecutive runs become `start-end` (both ends
//! inclusive), isolated values stay as they are.

use crate::utils::error::CodecError;

/// Compress a strictly ascending list into run-length notation
///
/// **Public** - used by every writer that prints rank or call lists
///
/// # Arguments
/// * `values` - Sorted, duplicate-free values
///
/// # Returns
/// Comma-separated notation, empty string for an empty list
pub fn compress_int_array(values: &[usize]) -> String {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < values.len() {
        let start = i;
        while i + 1 < values.len() && values[i] + 1 == values[i + 1] {
            i += 1;
        }
        if i != start {
            tokens.push(format!("{}-{}", values[start], values[i]));
        } else {
            tokens.push(values[i].to_string());
        }
        i += 1;
    }

    tokens.join(",")
}

/// Upper bound on the number of values a single list may expand to
pub const MAX_LIST_ELEMENTS: usize = 1 << 24;

/// Expand run-length notation back into the full list
///
/// **Public** - inverse of `compress_int_array`
///
/// Both `,` and `, ` separators are accepted.
///
/// # Errors
/// * `CodecError::InvalidToken` - a token is neither `n` nor `a-b`
/// * `CodecError::Format` - a range runs backwards or the list expands
///   past `MAX_LIST_ELEMENTS`
pub fn decode_compressed_list(list: &str) -> Result<Vec<usize>, CodecError> {
    let ranges = tokens(list)?;
    let total = total_elements(&ranges, list)?;
    if total > MAX_LIST_ELEMENTS {
        return Err(CodecError::Format(format!(
            "`{}` expands to {} values, more than {}",
            list, total, MAX_LIST_ELEMENTS
        )));
    }

    let mut values = Vec::with_capacity(total);
    for (start, end) in ranges {
        values.extend(start..=end);
    }

    Ok(values)
}

/// Count the elements of a compressed list without expanding it
///
/// **Public** - used when only the cardinality of a rank list matters
///
/// # Errors
/// * `CodecError::Format` - the count does not fit in a `usize`
pub fn count_elements(list: &str) -> Result<usize, CodecError> {
    total_elements(&tokens(list)?, list)
}

fn total_elements(ranges: &[(usize, usize)], list: &str) -> Result<usize, CodecError> {
    ranges
        .iter()
        .try_fold(0usize, |total, (start, end)| {
            (end - start)
                .checked_add(1)
                .and_then(|len| total.checked_add(len))
        })
        .ok_or_else(|| CodecError::Format(format!("`{}` holds too many values", list)))
}

/// Split a compressed list into inclusive `(start, end)` ranges
///
/// **Private** - shared by decode and count
fn tokens(list: &str) -> Result<Vec<(usize, usize)>, CodecError> {
    let list = list.trim();
    if list.is_empty() {
        return Ok(Vec::new());
    }

    list.split(',')
        .map(str::trim)
        .map(|token| parse_token(token, list))
        .collect()
}

fn parse_token(token: &str, list: &str) -> Result<(usize, usize), CodecError> {
    let invalid = || CodecError::InvalidToken {
        token: token.to_string(),
        list: list.to_string(),
    };

    match token.split_once('-') {
        Some((start, end)) => {
            let start: usize = start.trim().parse().map_err(|_| invalid())?;
            let end: usize = end.trim().parse().map_err(|_| invalid())?;
            if start > end {
                return Err(CodecError::Format(format!(
                    "range {}-{} in `{}` runs backwards",
                    start, end, list
                )));
            }
            Ok((start, end))
        }
        None => {
            let value: usize = token.parse().map_err(|_| invalid())?;
            Ok((value, value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_mixed_runs() {
        let values = [0, 1, 2, 3, 4, 5, 6, 8, 9, 10, 42];
        assert_eq!(compress_int_array(&values), "0-6,8-10,42");
    }

    #[test]
    fn test_compress_pairs_and_singletons() {
        assert_eq!(compress_int_array(&[]), "");
        assert_eq!(compress_int_array(&[7]), "7");
        assert_eq!(compress_int_array(&[1, 2]), "1-2");
        assert_eq!(compress_int_array(&[1, 3, 5]), "1,3,5");
    }

    #[test]
    fn test_decode_accepts_spaced_separator() {
        assert_eq!(decode_compressed_list("0-2, 5").unwrap(), vec![0, 1, 2, 5]);
        assert_eq!(decode_compressed_list("0-2,5").unwrap(), vec![0, 1, 2, 5]);
        assert!(decode_compressed_list("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_compressed_list("1,x"),
            Err(CodecError::InvalidToken { .. })
        ));
        assert!(matches!(
            decode_compressed_list("1-2-3"),
            Err(CodecError::InvalidToken { .. })
        ));
        assert!(matches!(
            decode_compressed_list("5-1"),
            Err(CodecError::Format(_))
        ));
    }

    #[test]
    fn test_huge_ranges_are_rejected() {
        let full = format!("0-{}", usize::MAX);
        assert!(matches!(count_elements(&full), Err(CodecError::Format(_))));
        assert!(matches!(
            decode_compressed_list(&full),
            Err(CodecError::Format(_))
        ));

        let twice = format!("0-{},{}", usize::MAX - 1, usize::MAX);
        assert!(matches!(count_elements(&twice), Err(CodecError::Format(_))));

        let wide = format!("5,10-{}", 10 + MAX_LIST_ELEMENTS);
        assert_eq!(count_elements(&wide).unwrap(), MAX_LIST_ELEMENTS + 2);
        assert!(matches!(
            decode_compressed_list(&wide),
            Err(CodecError::Format(_))
        ));
    }

    #[test]
    fn test_count_elements() {
        assert_eq!(count_elements("1,2").unwrap(), 2);
        assert_eq!(count_elements("1-5").unwrap(), 5);
        assert_eq!(count_elements("0,1-5,6").unwrap(), 7);
    }
}
