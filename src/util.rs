use std::ops::RangeFrom;

use nom::error::{make_error, ErrorKind, ParseError};
use nom::{Err, IResult, InputIter, InputLength, Parser, Slice};
use tinyvec::{Array, ArrayVec};

/// Like `nom::multi::many0`, collecting into a bounded [`ArrayVec`].
///
/// Running out of capacity is a parse failure, never a panic.
#[inline(always)]
pub fn many0<I, O, E, F, A>(mut f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    move |mut i: I| {
        let mut acc = ArrayVec::default();
        loop {
            let len = i.input_len();
            match f.parse(i.clone()) {
                Err(Err::Error(_)) => return Ok((i, acc)),
                Err(e) => return Err(e),
                Ok((i1, o)) => {
                    // infinite loop check: the parser must always consume
                    if i1.input_len() == len {
                        return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many0)));
                    }
                    if acc.len() == acc.capacity() {
                        return Err(Err::Failure(E::from_error_kind(i, ErrorKind::TooLarge)));
                    }

                    i = i1;
                    acc.push(o);
                }
            }
        }
    }
}

/// [`many0`] that requires at least one element.
#[inline(always)]
pub fn many1<I, O, E, F, A>(f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    let mut inner = many0(f);
    move |i: I| {
        let (rest, acc) = inner(i.clone())?;
        if acc.is_empty() {
            return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many1)));
        }
        Ok((rest, acc))
    }
}

/// Require that a length-delimited sub-parser consumed all of its input.
pub fn all_consuming_slice<'a, O, F>(mut f: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], O>
where
    F: Parser<&'a [u8], O, nom::error::Error<&'a [u8]>>,
{
    move |input: &'a [u8]| {
        let (rest, out) = f.parse(input)?;
        if !rest.is_empty() {
            return Err(Err::Failure(make_error(rest, ErrorKind::LengthValue)));
        }
        Ok((rest, out))
    }
}

pub fn be_u48<I, E: ParseError<I>>(input: I) -> IResult<I, u64, E>
where
    I: Slice<RangeFrom<usize>> + InputIter<Item = u8> + InputLength,
{
    let bound: usize = 6;

    if input.input_len() < bound {
        Err(Err::Error(make_error(input, ErrorKind::Eof)))
    } else {
        let mut res = 0u64;

        for byte in input.iter_elements().take(bound) {
            res = (res << 8) + byte as u64;
        }

        Ok((input.slice(bound..), res))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nom::number::complete::be_u8;

    #[test]
    fn many0_fails_when_full() {
        let input: &[u8] = &[1, 2, 3];
        let r: IResult<&[u8], ArrayVec<[u8; 2]>> = many0(be_u8)(input);
        assert!(matches!(r, Err(Err::Failure(_))));

        let r: IResult<&[u8], ArrayVec<[u8; 4]>> = many0(be_u8)(input);
        assert_eq!(r.unwrap().1.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn many1_needs_one() {
        let input: &[u8] = &[];
        let r: IResult<&[u8], ArrayVec<[u8; 4]>> = many1(be_u8)(input);
        assert!(r.is_err());
    }

    #[test]
    fn parse_u48() {
        let input: &[u8] = &[0, 0, 0, 0, 1, 2, 9];
        let (rest, v) = be_u48::<_, nom::error::Error<&[u8]>>(input).unwrap();
        assert_eq!(v, 0x0102);
        assert_eq!(rest, &[9]);
    }
}
