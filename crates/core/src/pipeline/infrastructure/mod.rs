pub mod onnx_vision_engine;
