//! CBOR helpers for field types that don't implement minicbor traits.
//!
//! Decimals are written as their canonical string form so the scale survives a
//! round trip (`182.00` stays `182.00`).

pub mod decimal {
    use minicbor::{Decoder, Encoder, decode as dec, encode as enc};
    use rust_decimal::Decimal;

    pub fn encode<Ctx, W: enc::Write>(
        v: &Decimal,
        e: &mut Encoder<W>,
        _: &mut Ctx,
    ) -> Result<(), enc::Error<W::Error>> {
        e.str(&v.to_string())?.ok()
    }

    pub fn decode<Ctx>(d: &mut Decoder<'_>, _: &mut Ctx) -> Result<Decimal, dec::Error> {
        d.str()?
            .parse()
            .map_err(|_| dec::Error::message("failed to parse decimal"))
    }
}

pub mod opt_decimal {
    use minicbor::data::Type;
    use minicbor::{Decoder, Encoder, decode as dec, encode as enc};
    use rust_decimal::Decimal;

    pub fn encode<Ctx, W: enc::Write>(
        v: &Option<Decimal>,
        e: &mut Encoder<W>,
        ctx: &mut Ctx,
    ) -> Result<(), enc::Error<W::Error>> {
        match v {
            Some(v) => super::decimal::encode(v, e, ctx),
            None => e.null()?.ok(),
        }
    }

    pub fn decode<Ctx>(
        d: &mut Decoder<'_>,
        ctx: &mut Ctx,
    ) -> Result<Option<Decimal>, dec::Error> {
        if d.datatype()? == Type::Null {
            d.null()?;
            return Ok(None);
        }
        super::decimal::decode(d, ctx).map(Some)
    }
}
