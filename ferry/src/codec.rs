// Wire format of one image, one message per connection:
//
//   i32 width | i32 height | i32 frames | i32 channels | f32 * (w*h*f*c)
//
// Everything is little endian. There is no length prefix, version tag or
// checksum; the header alone determines the payload size.

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    config::Limits,
    error::{Error, Result},
    image::{Image, sample_count},
};

/// Byte order of header and samples. Sender and receiver must agree on it
/// since nothing on the wire says which one was used.
pub type WireOrder = LittleEndian;

pub const HEADER_LEN: usize = 4 * DIM_LEN;
const DIM_LEN: usize = std::mem::size_of::<i32>();
pub const SAMPLE_LEN: usize = std::mem::size_of::<f32>();

/// Dimensions and payload size announced by a header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub width: usize,
    pub height: usize,
    pub frames: usize,
    pub channels: usize,
}

impl Header {
    pub fn of(image: &Image) -> Self {
        let (width, height, frames, channels) = image.dims();
        Self {
            width,
            height,
            frames,
            channels,
        }
    }

    pub fn samples(&self) -> Result<usize> {
        sample_count(self.width, self.height, self.frames, self.channels)
    }

    pub fn payload_len(&self) -> Result<usize> {
        self.samples()?
            .checked_mul(SAMPLE_LEN)
            .ok_or_else(|| Error::protocol("declared payload overflows"))
    }

    pub fn write(&self, dst: &mut [u8]) {
        for (chunk, d) in dst[..HEADER_LEN].chunks_exact_mut(DIM_LEN).zip([
            self.width,
            self.height,
            self.frames,
            self.channels,
        ]) {
            // images never carry dimensions beyond i32::MAX
            WireOrder::write_i32(chunk, d as i32);
        }
    }

    /// Parse and validate a header against `limits`.
    pub fn parse(src: &[u8; HEADER_LEN], limits: &Limits) -> Result<Self> {
        let mut dims = [0usize; 4];
        for (i, chunk) in src.chunks_exact(DIM_LEN).enumerate() {
            let d = WireOrder::read_i32(chunk);
            if d <= 0 {
                return Err(Error::protocol(format!(
                    "header declares non-positive dimension {d}"
                )));
            }
            dims[i] = d as usize;
        }
        let header = Self {
            width: dims[0],
            height: dims[1],
            frames: dims[2],
            channels: dims[3],
        };

        let payload = header.payload_len()?;
        if payload > limits.max_payload_bytes {
            return Err(Error::protocol(format!(
                "header declares {payload} payload bytes, limit is {}",
                limits.max_payload_bytes
            )));
        }
        Ok(header)
    }
}

/// Serialize `image` into a single buffer holding header and payload.
pub fn encode(image: &Image) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_LEN + image.samples().len() * SAMPLE_LEN];
    let (header, payload) = buf.split_at_mut(HEADER_LEN);
    Header::of(image).write(header);
    WireOrder::write_f32_into(image.samples(), payload);
    buf
}

fn samples_from_payload(header: Header, payload: &[u8]) -> Result<Image> {
    let mut data = vec![0f32; payload.len() / SAMPLE_LEN];
    WireOrder::read_f32_into(payload, &mut data);
    Image::from_samples(
        header.width,
        header.height,
        header.frames,
        header.channels,
        data,
    )
}

/// Decode a complete message held in memory. Missing or trailing bytes are
/// both rejected.
pub fn decode_slice(bytes: &[u8], limits: &Limits) -> Result<Image> {
    let Some((header, payload)) = bytes.split_first_chunk::<HEADER_LEN>() else {
        return Err(Error::protocol(format!(
            "truncated message: {} of {HEADER_LEN} header bytes",
            bytes.len()
        )));
    };
    let header = Header::parse(header, limits)?;
    let expected = header.payload_len()?;
    if payload.len() < expected {
        return Err(Error::protocol(format!(
            "truncated message: {} of {expected} payload bytes",
            payload.len()
        )));
    }
    if payload.len() > expected {
        return Err(Error::protocol(format!(
            "{} bytes after the declared payload",
            payload.len() - expected
        )));
    }
    samples_from_payload(header, payload)
}

async fn read_full<R>(reader: &mut R, buf: &mut [u8], part: &str) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::protocol(format!(
            "truncated message: stream ended inside the {part} ({} bytes expected)",
            buf.len()
        ))),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Read exactly one image from `reader`. Never returns a partially filled
/// image: a stream that ends early is a protocol error.
pub async fn read_image<R>(reader: &mut R, limits: &Limits) -> Result<Image>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; HEADER_LEN];
    read_full(reader, &mut raw, "header").await?;
    let header = Header::parse(&raw, limits)?;

    let mut payload = vec![0u8; header.payload_len()?];
    debug!(
        "reading {}x{}x{}x{} image ({} bytes)",
        header.width,
        header.height,
        header.frames,
        header.channels,
        payload.len()
    );
    read_full(reader, &mut payload, "payload").await?;
    samples_from_payload(header, &payload)
}

/// Write `image` and flush. `write_all` keeps writing until the last byte is
/// handed to the writer.
pub async fn write_image<W>(writer: &mut W, image: &Image) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode(image);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Image {
        Image::from_samples(4, 4, 1, 1, (0..16).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn header_is_little_endian() {
        let buf = encode(&ramp());

        assert_eq!(buf.len(), HEADER_LEN + 16 * SAMPLE_LEN);
        assert_eq!(&buf[..HEADER_LEN], &[4, 0, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]);
        // 1.0f32
        assert_eq!(&buf[HEADER_LEN + 4..HEADER_LEN + 8], &[0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn decode_keeps_bit_patterns() {
        let odd = vec![
            -0.0,
            f32::from_bits(0x7fc0_1234), // NaN with payload
            f32::INFINITY,
            f32::MIN_POSITIVE / 2.0, // subnormal
            f32::MAX,
            -1.5,
        ];
        let im = Image::from_samples(3, 1, 1, 2, odd.clone()).unwrap();

        let back = decode_slice(&encode(&im), &Limits::default()).unwrap();

        assert_eq!(back.dims(), (3, 1, 1, 2));
        let bits = |v: &[f32]| v.iter().map(|s| s.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(back.samples()), bits(&odd));
    }

    #[tokio::test]
    async fn stream_round_trip() {
        let im = ramp();
        let mut wire = Vec::new();
        write_image(&mut wire, &im).await.unwrap();

        let back = read_image(&mut wire.as_slice(), &Limits::default())
            .await
            .unwrap();
        assert_eq!(back, im);
    }

    #[tokio::test]
    async fn truncated_payload_is_rejected() {
        let wire = encode(&ramp());
        let cut = &wire[..wire.len() - 3];

        let res = read_image(&mut &cut[..], &Limits::default()).await;
        assert!(matches!(res, Err(Error::Protocol(m)) if m.contains("payload")));

        let res = decode_slice(cut, &Limits::default());
        assert!(matches!(res, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn truncated_header_is_rejected() {
        let wire = encode(&ramp());

        let res = read_image(&mut &wire[..7], &Limits::default()).await;
        assert!(matches!(res, Err(Error::Protocol(m)) if m.contains("header")));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut wire = encode(&ramp());
        wire.push(0);

        let res = decode_slice(&wire, &Limits::default());
        assert!(matches!(res, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn non_positive_dimensions_are_rejected() {
        let mut wire = encode(&ramp());
        WireOrder::write_i32(&mut wire[4..8], -4);
        let res = read_image(&mut wire.as_slice(), &Limits::default()).await;
        assert!(matches!(res, Err(Error::Protocol(_))));

        WireOrder::write_i32(&mut wire[4..8], 0);
        let res = read_image(&mut wire.as_slice(), &Limits::default()).await;
        assert!(matches!(res, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn oversized_header_fails_before_allocating() {
        // 2^31-1 squared samples, only the header is on the wire
        let mut wire = [0u8; HEADER_LEN];
        Header {
            width: i32::MAX as usize,
            height: i32::MAX as usize,
            frames: 1,
            channels: 1,
        }
        .write(&mut wire);

        let res = read_image(&mut &wire[..], &Limits::default()).await;
        assert!(matches!(res, Err(Error::Protocol(m)) if m.contains("limit")));
    }

    #[test]
    fn limit_is_configurable() {
        let wire = encode(&ramp());

        let tight = Limits::default().with_max_payload_bytes(16 * SAMPLE_LEN - 1);
        assert!(matches!(decode_slice(&wire, &tight), Err(Error::Protocol(_))));

        let exact = Limits::default().with_max_payload_bytes(16 * SAMPLE_LEN);
        assert!(decode_slice(&wire, &exact).is_ok());
    }
}
