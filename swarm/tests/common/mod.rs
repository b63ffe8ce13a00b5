//! In-memory `GpuDevice` that records every call and simulates the counter,
//! index and indirect-args buffers the way the kernels would.

#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use swarm::{
    BufferRole, BufferSpec, ChunkConstants, ChunkResources, DeviceLimits, GlobalUniforms,
    GpuDevice, KernelKind, SwarmError, SwarmResult, Viewport, constants::WORKGROUP_SIZE,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Create {
        id: u32,
        role: BufferRole,
        chunk: Option<u32>,
        size: u64,
    },
    Destroy {
        id: u32,
    },
    Write {
        id: u32,
        offset: u64,
        len: usize,
    },
    Flush,
    Compile,
    Bind {
        chunk: u32,
    },
    BeginFrame,
    Dispatch {
        chunk: u32,
        record_count: u32,
        workgroups: u32,
        counter_before: u32,
    },
    Copy {
        src: u32,
        dst: u32,
        dst_offset: u64,
    },
    BeginDraw,
    Draw {
        chunk: u32,
        vertices: u32,
        instances: u32,
    },
    Submit,
}

pub struct MockBuffer {
    id: u32,
}

pub struct MockBindings {
    chunk: u32,
    state: u32,
    counter: u32,
    indices: u32,
}

pub struct MockKernels;

pub struct MockFrame {
    drawing: bool,
}

pub struct MockState {
    pub events: Vec<Event>,
    pub specs: HashMap<u32, BufferSpec>,
    pub contents: HashMap<u32, Vec<u8>>,
    pub live_bytes: u64,
    pub peak_bytes: u64,
    /// Bytes written since the last flush, and the most ever held at once.
    pub pending_upload_bytes: u64,
    pub peak_upload_bytes: u64,
    /// Creation fails once live bytes would exceed this.
    pub budget: Option<u64>,
    pub fail_kernel: Option<KernelKind>,
    /// Records whose index is a multiple of this are culled.
    pub hide_every: Option<u32>,
    pub has_surface: bool,
    pub limits: DeviceLimits,
    pub viewport: Viewport,
    next_id: u32,
}

impl MockState {
    pub fn live_buffers(&self) -> usize {
        self.specs.len()
    }

    pub fn live_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.specs.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn read_u32s(&self, id: u32) -> Vec<u32> {
        bytemuck::pod_collect_to_vec(&self.contents[&id])
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn check_live(&self, id: u32) {
        assert!(self.specs.contains_key(&id), "buffer {id} used after release");
    }

    fn write(&mut self, id: u32, offset: u64, data: &[u8]) {
        self.check_live(id);
        if let Some(bytes) = self.contents.get_mut(&id) {
            let start = offset as usize;
            bytes[start..start + data.len()].copy_from_slice(data);
        }
    }
}

#[derive(Clone)]
pub struct MockDevice {
    state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState {
                events: Vec::new(),
                specs: HashMap::new(),
                contents: HashMap::new(),
                live_bytes: 0,
                peak_bytes: 0,
                pending_upload_bytes: 0,
                peak_upload_bytes: 0,
                budget: None,
                fail_kernel: None,
                hide_every: None,
                has_surface: true,
                limits: DeviceLimits {
                    max_buffer_size: 256 << 20,
                    max_storage_buffer_binding_size: 128 << 20,
                    max_workgroups_per_dimension: 65535,
                },
                viewport: Viewport::new(800, 600),
                next_id: 0,
            })),
        }
    }

    pub fn state(&self) -> Rc<RefCell<MockState>> {
        self.state.clone()
    }
}

impl GpuDevice for MockDevice {
    type Buffer = MockBuffer;
    type Kernels = MockKernels;
    type Bindings = MockBindings;
    type Frame = MockFrame;

    fn limits(&self) -> DeviceLimits {
        self.state.borrow().limits
    }

    fn viewport(&self) -> Viewport {
        self.state.borrow().viewport
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.state.borrow_mut().viewport = Viewport::new(width, height);
    }

    fn create_buffer(&mut self, spec: &BufferSpec) -> SwarmResult<MockBuffer> {
        let mut state = self.state.borrow_mut();
        if let Some(budget) = state.budget {
            if state.live_bytes + spec.size > budget {
                return Err(SwarmError::AllocationExceeded {
                    buffer: spec.label(),
                    bytes: spec.size,
                    reason: "out of memory".into(),
                });
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        state.live_bytes += spec.size;
        state.peak_bytes = state.peak_bytes.max(state.live_bytes);
        state.specs.insert(id, spec.clone());
        if spec.role != BufferRole::NodeState {
            state.contents.insert(id, vec![0; spec.size as usize]);
        }
        state.events.push(Event::Create {
            id,
            role: spec.role,
            chunk: spec.chunk,
            size: spec.size,
        });
        Ok(MockBuffer { id })
    }

    fn destroy_buffer(&mut self, buffer: MockBuffer) {
        let mut state = self.state.borrow_mut();
        let spec = state
            .specs
            .remove(&buffer.id)
            .unwrap_or_else(|| panic!("buffer {} destroyed twice", buffer.id));
        state.contents.remove(&buffer.id);
        state.live_bytes -= spec.size;
        state.events.push(Event::Destroy { id: buffer.id });
    }

    fn write_buffer(&mut self, buffer: &MockBuffer, offset: u64, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        assert!(offset + data.len() as u64 <= state.specs[&buffer.id].size);
        state.pending_upload_bytes += data.len() as u64;
        state.peak_upload_bytes = state.peak_upload_bytes.max(state.pending_upload_bytes);
        state.write(buffer.id, offset, data);
        state.events.push(Event::Write {
            id: buffer.id,
            offset,
            len: data.len(),
        });
    }

    fn flush_uploads(&mut self) {
        let mut state = self.state.borrow_mut();
        state.pending_upload_bytes = 0;
        state.events.push(Event::Flush);
    }

    fn compile_kernels(&mut self) -> SwarmResult<MockKernels> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Compile);
        match state.fail_kernel {
            Some(kernel) => Err(SwarmError::KernelCompile {
                kernel,
                detail: "injected failure".into(),
            }),
            None => Ok(MockKernels),
        }
    }

    fn bind_chunk(
        &mut self,
        _kernels: &MockKernels,
        chunk: &ChunkResources<MockBuffer>,
        uniforms: &GlobalUniforms<MockBuffer>,
    ) -> MockBindings {
        let mut state = self.state.borrow_mut();
        for id in [
            chunk.state.id,
            chunk.visible_count.id,
            chunk.visible_indices.id,
            uniforms.viewport.id,
            uniforms.clock.id,
        ] {
            state.check_live(id);
        }
        state.events.push(Event::Bind {
            chunk: chunk.descriptor.index,
        });
        MockBindings {
            chunk: chunk.descriptor.index,
            state: chunk.state.id,
            counter: chunk.visible_count.id,
            indices: chunk.visible_indices.id,
        }
    }

    fn begin_frame(&mut self) -> Option<MockFrame> {
        let mut state = self.state.borrow_mut();
        if !state.has_surface {
            return None;
        }
        state.events.push(Event::BeginFrame);
        Some(MockFrame { drawing: false })
    }

    fn dispatch_update(
        &mut self,
        frame: &mut MockFrame,
        _kernels: &MockKernels,
        bindings: &MockBindings,
        constants: ChunkConstants,
        workgroups: u32,
    ) {
        assert!(!frame.drawing, "compute recorded inside the render pass");
        let mut state = self.state.borrow_mut();
        state.check_live(bindings.state);

        let counter_before = state.read_u32s(bindings.counter)[0];
        let mut counter = counter_before;
        let mut indices = state.read_u32s(bindings.indices);

        // One invocation per slot of the dispatch; slots past the record
        // count return early, as in the kernel.
        for idx in 0..workgroups * WORKGROUP_SIZE {
            if idx >= constants.record_count {
                continue;
            }
            let visible = state.hide_every.is_none_or(|every| idx % every != 0);
            if visible {
                indices[counter as usize] = idx;
                counter += 1;
            }
        }

        state.write(bindings.counter, 0, bytemuck::bytes_of(&counter));
        state.write(bindings.indices, 0, bytemuck::cast_slice(&indices));
        state.events.push(Event::Dispatch {
            chunk: bindings.chunk,
            record_count: constants.record_count,
            workgroups,
            counter_before,
        });
    }

    fn copy_buffer(
        &mut self,
        frame: &mut MockFrame,
        src: &MockBuffer,
        src_offset: u64,
        dst: &MockBuffer,
        dst_offset: u64,
        size: u64,
    ) {
        assert!(!frame.drawing, "copy recorded inside the render pass");
        let mut state = self.state.borrow_mut();
        state.check_live(src.id);
        let bytes =
            state.contents[&src.id][src_offset as usize..(src_offset + size) as usize].to_vec();
        state.write(dst.id, dst_offset, &bytes);
        state.events.push(Event::Copy {
            src: src.id,
            dst: dst.id,
            dst_offset,
        });
    }

    fn begin_draw(&mut self, frame: &mut MockFrame, _clear: [f64; 4]) {
        frame.drawing = true;
        self.state.borrow_mut().events.push(Event::BeginDraw);
    }

    fn draw_indirect(
        &mut self,
        frame: &mut MockFrame,
        _kernels: &MockKernels,
        bindings: &MockBindings,
        indirect: &MockBuffer,
    ) {
        assert!(frame.drawing, "draw recorded outside the render pass");
        let mut state = self.state.borrow_mut();
        state.check_live(indirect.id);
        let args = state.read_u32s(indirect.id);
        state.events.push(Event::Draw {
            chunk: bindings.chunk,
            vertices: args[0],
            instances: args[1],
        });
    }

    fn submit(&mut self, frame: MockFrame) {
        assert!(frame.drawing, "submitted without a render pass");
        let mut state = self.state.borrow_mut();
        state.pending_upload_bytes = 0;
        state.events.push(Event::Submit);
    }
}

/// Ids of the buffers created in `events`, in creation order.
pub fn created(events: &[Event]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Create { id, .. } => Some(*id),
            _ => None,
        })
        .collect()
}

/// Ids of the buffers destroyed in `events`, in destruction order.
pub fn destroyed(events: &[Event]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Destroy { id } => Some(*id),
            _ => None,
        })
        .collect()
}
