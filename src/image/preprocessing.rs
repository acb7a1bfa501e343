use crate::config::ResizeFilter;
use crate::image::loader::ImageLoader;
use crate::utils::error::ClassifyError;
use crate::Result;
use image::DynamicImage;
use ndarray::Array4;

/// 模型输入通道数
pub const INPUT_CHANNELS: usize = 3;
/// 模型输入高度
pub const INPUT_HEIGHT: usize = 224;
/// 模型输入宽度
pub const INPUT_WIDTH: usize = 224;
/// 张量元素总数 (3 * 224 * 224)
pub const TENSOR_LEN: usize = INPUT_CHANNELS * INPUT_HEIGHT * INPUT_WIDTH;

/// ImageNet 均值 (R, G, B)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet 标准差 (R, G, B)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 归一化后的 CHW 张量，长度恒为 [`TENSOR_LEN`]
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Vec<f32>);

impl NormalizedTensor {
    pub fn from_vec(data: Vec<f32>) -> Result<Self> {
        if data.len() != TENSOR_LEN {
            return Err(ClassifyError::InvalidInput(format!(
                "Tensor must have {} elements, got {}",
                TENSOR_LEN,
                data.len()
            )));
        }
        Ok(Self(data))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// (c, h, w) 处的值
    pub fn get(&self, c: usize, h: usize, w: usize) -> f32 {
        self.0[c * INPUT_HEIGHT * INPUT_WIDTH + h * INPUT_WIDTH + w]
    }

    /// 转为 [1, 3, 224, 224] 的 batch 张量
    pub fn into_batch(self) -> Result<Array4<f32>> {
        Array4::from_shape_vec((1, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH), self.0)
            .map_err(|e| ClassifyError::Internal(format!("Tensor reshape failed: {}", e)))
    }
}

/// 分类模型预处理：解码、缩放、归一化、HWC → CHW
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    filter: ResizeFilter,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(ResizeFilter::Triangle)
    }
}

impl ImagePreprocessor {
    pub fn new(filter: ResizeFilter) -> Self {
        Self { filter }
    }

    /// 从原始字节得到模型输入张量
    pub fn preprocess(&self, bytes: &[u8]) -> Result<NormalizedTensor> {
        let image = ImageLoader::decode(bytes)?;
        Ok(self.preprocess_image(&image))
    }

    /// 对已解码的图像做缩放和归一化
    pub fn preprocess_image(&self, image: &DynamicImage) -> NormalizedTensor {
        // 直接拉伸到 224x224，不保持宽高比
        let resized = image
            .resize_exact(INPUT_WIDTH as u32, INPUT_HEIGHT as u32, self.filter.into())
            .to_rgb8();

        let plane = INPUT_HEIGHT * INPUT_WIDTH;
        let mut data = vec![0.0f32; TENSOR_LEN];

        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * INPUT_WIDTH + x as usize;
            for c in 0..INPUT_CHANNELS {
                let value = pixel[c] as f32 / 255.0;
                data[c * plane + offset] = (value - MEAN[c]) / STD[c];
            }
        }

        NormalizedTensor(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, Rgba};
    use std::io::Cursor;

    fn encode(image: DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        encode(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            width,
            height,
            Rgb(rgb),
        )))
    }

    #[test]
    fn solid_red_normalizes_per_channel() {
        let tensor = ImagePreprocessor::default()
            .preprocess(&solid(224, 224, [255, 0, 0]))
            .unwrap();
        assert_eq!(tensor.len(), TENSOR_LEN);

        let expected = [
            (1.0 - 0.485) / 0.229,
            (0.0 - 0.456) / 0.224,
            (0.0 - 0.406) / 0.225,
        ];
        for (c, want) in expected.iter().enumerate() {
            let channel = &tensor.as_slice()[c * 224 * 224..(c + 1) * 224 * 224];
            assert!(channel.iter().all(|v| (v - want).abs() < 1e-3), "channel {c}");
        }
        assert!((tensor.get(0, 0, 0) - 2.249).abs() < 1e-3);
        assert!((tensor.get(1, 100, 50) + 2.036).abs() < 1e-3);
        assert!((tensor.get(2, 223, 223) + 1.804).abs() < 1e-3);
    }

    #[test]
    fn output_is_always_full_length() {
        let pre = ImagePreprocessor::default();
        for (w, h) in [(1, 1), (17, 400), (640, 480)] {
            let tensor = pre.preprocess(&solid(w, h, [1, 2, 3])).unwrap();
            assert_eq!(tensor.len(), 150_528);
        }
    }

    #[test]
    fn identical_bytes_give_identical_floats() {
        let mut img = ImageBuffer::new(97, 61);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8]);
        }
        let bytes = encode(DynamicImage::ImageRgb8(img));

        let pre = ImagePreprocessor::default();
        let a = pre.preprocess(&bytes).unwrap();
        let b = pre.preprocess(&bytes).unwrap();
        assert!(a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn layout_is_channel_major() {
        // 左半部分绿色，右半部分蓝色
        let mut img = ImageBuffer::new(224, 224);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = if x < 112 { Rgb([0, 255, 0]) } else { Rgb([0, 0, 255]) };
        }
        let tensor = ImagePreprocessor::new(ResizeFilter::Nearest)
            .preprocess(&encode(DynamicImage::ImageRgb8(img)))
            .unwrap();

        let green_hi = (1.0 - MEAN[1]) / STD[1];
        let blue_hi = (1.0 - MEAN[2]) / STD[2];
        assert!((tensor.get(1, 10, 0) - green_hi).abs() < 1e-5);
        assert!((tensor.get(2, 10, 223) - blue_hi).abs() < 1e-5);
        assert!((tensor.as_slice()[224 * 224 + 10 * 224] - green_hi).abs() < 1e-5);
    }

    #[test]
    fn alpha_channel_is_ignored() {
        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(32, 32, Rgba([255, 0, 0, 7])));
        let tensor = ImagePreprocessor::default().preprocess(&encode(rgba)).unwrap();
        assert!((tensor.get(0, 5, 5) - (1.0 - 0.485) / 0.229).abs() < 1e-3);
    }

    #[test]
    fn corrupted_input_never_yields_tensor() {
        let pre = ImagePreprocessor::default();
        assert!(matches!(pre.preprocess(&[]), Err(ClassifyError::Decode(_))));
        let err = pre.preprocess(&[0x89, b'P', b'N', b'G', 0, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Decode(_) | ClassifyError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn batch_shape_is_nchw() {
        let tensor = ImagePreprocessor::default()
            .preprocess(&solid(8, 8, [0, 0, 0]))
            .unwrap();
        assert_eq!(tensor.into_batch().unwrap().shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(NormalizedTensor::from_vec(vec![0.0; 10]).is_err());
        assert!(NormalizedTensor::from_vec(vec![0.0; TENSOR_LEN]).is_ok());
    }
}
